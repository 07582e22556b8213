//! Tracing initialization for the Conduit gateway
//!
//! Installs a `tracing-subscriber` with an env-filter derived from config
//! (overridable via `RUST_LOG`) and either human-readable or JSON output.

use conduit_config::TelemetryConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(config: Option<&TelemetryConfig>, default_level: &str) -> anyhow::Result<()> {
    let level = config.map_or(default_level, |c| c.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.is_some_and(|c| c.json) {
        builder.json().try_init().map_err(|e| anyhow::anyhow!("{e}"))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    Ok(())
}
