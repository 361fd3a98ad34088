//! Optional tracing subscriber setup for hosts that don't install their own.

use crate::core::config::LoggingConfig;
use crate::core::{Result, ReporterError};

/// Environment variable consulted before the configured level
pub const LOG_LEVEL_ENV: &str = "ES_REPORTER_LOG_LEVEL";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` wins over [`LOG_LEVEL_ENV`], which wins over the configured level.
/// Fails if the process already has a global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.level.as_str().to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ReporterError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
