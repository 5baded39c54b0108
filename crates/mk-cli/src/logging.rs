//! Logging setup. Engine code logs through the `log` facade; the
//! subscriber picks those records up through its `log` bridge.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the level, e.g. `MOCKIFY_LOG=mockify=debug`.
pub const LOG_ENV: &str = "MOCKIFY_LOG";

pub fn init(verbose: bool) -> Result<(), String> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
