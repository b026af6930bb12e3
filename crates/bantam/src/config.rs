use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ApiClient;

/// Default API server URL for the hosted environment.
pub(crate) const DEFAULT_API_URL: &str = "https://api.bantam.host";

/// Prefix of environment variables that override the session configuration.
const ENV_PREFIX: &str = "BANTAM_";

/// Session configuration errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum SessionConfigError {
    /// Unable to load the configuration using [`figment`].
    Figment(figment::Error),

    /// IO-related error.
    Io(io::Error),

    /// Unable to serialize the configuration using [`toml`] crate.
    Toml(toml::ser::Error),

    /// User's home directory cannot be determined.
    #[display(fmt = "unable to find home directory")]
    HomeDirNotFound,
}

/// Error returned when a command needs a stored authentication token.
#[derive(Debug, Display, Error)]
#[display(fmt = "Authentication required. Run \"bantam login\" first.")]
pub(crate) struct AuthRequired;

/// Persisted user session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Session {
    /// Personal access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Email of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Custom API server URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// File-backed [`Session`] storage.
pub(crate) struct SessionStore {
    /// Session file location.
    path: PathBuf,
}

impl SessionStore {
    /// Create new store at the default location (`~/.bantam/config.toml`).
    ///
    /// Returns [`Err`] if home directory cannot be determined.
    pub fn new() -> Result<Self, SessionConfigError> {
        let mut path = home::home_dir().ok_or(SessionConfigError::HomeDirNotFound)?;
        path.push(".bantam/config.toml");
        Ok(Self { path })
    }

    /// Create new store backed by the provided file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Session file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// A missing session file yields an empty session.
    pub fn load(&self) -> Result<Session, SessionConfigError> {
        Ok(Figment::new().merge(Toml::file(&self.path)).extract()?)
    }

    /// Replace the stored session.
    pub fn save(&self, session: &Session) -> Result<(), SessionConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, toml::to_string(session)?)?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Remove the stored session.
    pub fn clear(&self) -> Result<(), SessionConfigError> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}

/// Read the API URL override from the environment (`BANTAM_API_URL`).
fn api_url_from_env() -> Option<String> {
    Figment::new()
        .merge(Env::prefixed(ENV_PREFIX).only(&["api_url"]))
        .extract_inner("api_url")
        .ok()
}

/// Pick the API URL: environment override, then stored value, then default.
fn resolve_api_url(env_override: Option<String>, session: &Session) -> String {
    env_override
        .or_else(|| session.api_url.clone())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_API_URL))
}

/// Per-invocation context threaded through every command.
pub(crate) struct Context {
    /// Session storage.
    store: SessionStore,

    /// Loaded session.
    session: Session,

    /// Resolved API server URL.
    api_url: String,
}

impl Context {
    /// Load the session from the provided store, applying environment overrides.
    pub fn load(store: SessionStore) -> Result<Self, SessionConfigError> {
        let session = store.load()?;
        let api_url = resolve_api_url(api_url_from_env(), &session);

        Ok(Self {
            store,
            session,
            api_url,
        })
    }

    /// Create context with an explicit API URL.
    #[cfg(test)]
    pub fn with_api_url(store: SessionStore, api_url: &str) -> Result<Self, SessionConfigError> {
        Ok(Self {
            session: store.load()?,
            store,
            api_url: api_url.to_owned(),
        })
    }

    /// Currently loaded session.
    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolved API server URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Check if an authentication token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.session
            .token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Ensure an authentication token is stored.
    pub fn require_auth(&self) -> Result<(), AuthRequired> {
        if !self.is_authenticated() {
            return Err(AuthRequired);
        }

        Ok(())
    }

    /// Create API client authorized with the stored token.
    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.api_url, self.session.token.clone())
    }

    /// Create API client authorized with the provided token.
    pub fn api_with_token(&self, token: &str) -> ApiClient {
        ApiClient::new(&self.api_url, Some(token.to_owned()))
    }

    /// Persist a new token and email.
    pub fn store_credentials(
        &mut self,
        token: String,
        email: Option<String>,
    ) -> Result<(), SessionConfigError> {
        let session = Session {
            token: Some(token),
            email,
            api_url: self.session.api_url.clone(),
        };

        self.store.save(&session)?;
        self.session = session;
        Ok(())
    }

    /// Remove the stored session, returning the previous one.
    pub fn clear(&mut self) -> Result<Session, SessionConfigError> {
        self.store.clear()?;
        Ok(std::mem::take(&mut self.session))
    }
}
