//! Logging setup

use crate::{AgentError, ExporterConfig, Result};
use tracing_subscriber::EnvFilter;

/// Filter directive for a configured log level.
///
/// `development` maps to `debug` and `production` to `info`; anything else is used as is.
pub fn filter_directive(log_level: &str) -> String {
    match log_level.to_lowercase().as_str() {
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &ExporterConfig) -> Result<()> {
    let directive = filter_directive(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match config.log_format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };
    installed.map_err(|e| AgentError::config(format!("Failed to install logger: {}", e)))?;

    tracing::info!(level = %directive, format = %config.log_format, "Logging initialized");
    Ok(())
}
