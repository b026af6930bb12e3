use colored::Colorize;
use derive_more::{Display, Error, From};

use crate::{
    api::{ApiError, BantamApi, User},
    config::Context,
    display,
};

/// `whoami` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum WhoamiError {
    /// Token validation request failed.
    #[display(fmt = "Failed to get user info: {}", _0)]
    Api(ApiError),

    /// Stored token was rejected.
    #[display(fmt = "Your authentication token is invalid or expired. Please login again.")]
    InvalidToken,
}

/// `whoami` flow entrypoint.
pub(crate) async fn whoami(context: &Context) -> Result<(), WhoamiError> {
    if !context.is_authenticated() {
        display::info("Not logged in. Run \"bantam login\" to authenticate.");
        return Ok(());
    }

    let user = current_user(&context.api()).await?;

    println!("{}", "Current User:".cyan());
    println!("  Email: {}", user.email.as_deref().unwrap_or("N/A").bold());
    println!("  User ID: {}", user.id.dimmed());

    if let Some(tier) = &user.tier {
        println!("  Tier: {}", tier.bold());
    }

    println!("  API URL: {}", context.api_url().dimmed());

    Ok(())
}

/// Fetch the owner of the stored token.
async fn current_user<A: BantamApi + ?Sized>(api: &A) -> Result<User, WhoamiError> {
    match api.validate_token().await {
        Ok(validation) if validation.valid => Ok(validation.user),
        Ok(_) => Err(WhoamiError::InvalidToken),
        Err(error) if matches!(error.status, Some(401 | 403)) => Err(WhoamiError::InvalidToken),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use tempfile::TempDir;

    use super::{current_user, whoami, WhoamiError};
    use crate::{
        api::ApiError,
        config::{Context, SessionStore},
        testing::FakeApi,
    };

    #[tokio::test]
    async fn anonymous_user_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let context =
            Context::with_api_url(SessionStore::at(dir.path().join("config.toml")), "http://127.0.0.1:1")
                .unwrap();

        whoami(&context).await.unwrap();
    }

    #[tokio::test]
    async fn valid_token() {
        let user = current_user(&FakeApi::default()).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn rejected_token() {
        let api = FakeApi {
            token: Err(ApiError::new("unauthorized").with_status(StatusCode::UNAUTHORIZED)),
            ..Default::default()
        };

        assert!(matches!(
            current_user(&api).await,
            Err(WhoamiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn server_failure() {
        let api = FakeApi {
            token: Err(ApiError::new("Request failed with status 500")),
            ..Default::default()
        };

        assert_eq!(
            current_user(&api).await.unwrap_err().to_string(),
            "Failed to get user info: Request failed with status 500"
        );
    }
}
