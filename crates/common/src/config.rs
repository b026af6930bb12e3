use figment::{providers::Env, Figment};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Prefix of environment variables that configure logging.
pub const LOGGING_ENV_PREFIX: &str = "BANTAM_LOG_";

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
///
/// [`FromStr`]: std::str::FromStr
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[cfg(feature = "logging")]
    #[serde(default = "default_level", deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,

    /// Include event targets in the log output.
    #[serde(default)]
    pub with_target: bool,
}

#[cfg(feature = "logging")]
fn default_level() -> LevelFilter {
    LevelFilter::WARN
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            #[cfg(feature = "logging")]
            level: default_level(),
            with_target: false,
        }
    }
}

impl Logging {
    /// Create new logging config using environment variables.
    ///
    /// Variables are read with the [`LOGGING_ENV_PREFIX`] prefix, so
    /// `BANTAM_LOG_LEVEL=debug` sets the [`level`] field.
    ///
    /// [`level`]: Logging::level
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Env::prefixed(LOGGING_ENV_PREFIX))
            .extract()
    }
}
