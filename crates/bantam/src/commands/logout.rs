use crate::{
    config::{Context, SessionConfigError},
    display,
};

/// Logout flow entrypoint.
pub(crate) fn logout(context: &mut Context) -> Result<(), SessionConfigError> {
    let previous = context.clear()?;

    display::success("Logged out successfully");

    if let Some(email) = previous.email {
        display::info(format!("You were logged in as {email}"));
    }

    Ok(())
}
