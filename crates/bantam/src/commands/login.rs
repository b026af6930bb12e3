use std::io;

use colored::Colorize;
use derive_more::{Display, Error, From};

use crate::{
    api::{ApiError, BantamApi, User},
    commands::Login,
    config::{Context, SessionConfigError},
    display,
    prompt::Prompter,
};

/// Page where personal access tokens are issued.
const TOKENS_PAGE: &str = "https://bantam.host/account";

/// `login` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum LoginError {
    /// Unable to read the token from the terminal.
    #[display(fmt = "unable to read token: {}", _0)]
    Prompt(io::Error),

    /// Provided token is empty.
    #[display(fmt = "Token is required")]
    EmptyToken,

    /// Token validation request failed.
    #[display(fmt = "Authentication failed: {}", _0)]
    Authentication(ApiError),

    /// Server reported the token as invalid.
    #[display(fmt = "Authentication failed: invalid token")]
    InvalidToken,

    /// Unable to persist the session.
    Session(SessionConfigError),
}

/// Login flow entrypoint.
pub(crate) async fn login(
    Login { token }: Login,
    context: &mut Context,
    prompter: &dyn Prompter,
) -> Result<(), LoginError> {
    let token = match token {
        Some(token) => token,
        None => {
            println!("{}", display::primary("Login to Bantam"));
            println!(
                "{}{}",
                "You can create a personal access token at: ".dimmed(),
                display::primary(TOKENS_PAGE).underline()
            );
            println!();

            prompter.password("Personal Access Token")?
        }
    };

    let token = token.trim().to_owned();

    if token.is_empty() {
        return Err(LoginError::EmptyToken);
    }

    let progress = display::spinner("Validating token...");
    let api = context.api_with_token(&token);

    let user = match authenticate(&api, token, context).await {
        Ok(user) => user,
        Err(error) => {
            progress.finish_and_clear();
            return Err(error);
        }
    };

    match &user.email {
        Some(email) => display::succeed(&progress, format!("Logged in successfully as {email}")),
        None => display::succeed(&progress, "Logged in successfully"),
    }

    if let Some(tier) = &user.tier {
        display::info(format!("Account tier: {}", tier.bold()));
    }

    Ok(())
}

/// Validate the token and persist it along with the owner's email.
///
/// Tokens rejected by the server are never stored.
async fn authenticate<A: BantamApi + ?Sized>(
    api: &A,
    token: String,
    context: &mut Context,
) -> Result<User, LoginError> {
    let validation = api
        .validate_token()
        .await
        .map_err(LoginError::Authentication)?;

    if !validation.valid {
        return Err(LoginError::InvalidToken);
    }

    context.store_credentials(token, validation.user.email.clone())?;

    Ok(validation.user)
}
