use tracing_core::Level;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::Logging;

/// Install the global [`tracing`] subscriber.
///
/// Logs go to stderr, so they never mix with command output. HTTP client
/// internals are capped at `WARN` regardless of the configured level.
///
/// [`tracing`]: https://docs.rs/tracing
pub fn init(config: &Logging) {
    init_with_level(config, config.level);
}

/// Same as [`init`], but overrides the configured level.
pub fn init_with_level(config: &Logging, level: LevelFilter) {
    let fmt = fmt::format().with_target(config.with_target).compact();

    let target_filters = Targets::new()
        .with_target("hyper", Level::WARN)
        .with_target("reqwest", Level::WARN)
        .with_target("rustls", Level::WARN)
        .with_default(level);

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().event_format(fmt).with_writer(std::io::stderr))
        .with(target_filters)
        .try_init();
}
