use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the global tracing subscriber.
///
/// Compact text in development, JSON lines elsewhere. Logs go to stderr so
/// command output on stdout stays clean.
pub fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow!("invalid log filter '{}': {}", config.log_level, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.environment.is_development() {
        builder.compact().try_init()
    } else {
        builder.json().try_init()
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}
