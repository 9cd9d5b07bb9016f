//! Process-wide logging setup.
//!
//! Library code logs through the `log` macros and opens `tracing` spans;
//! both end up in one `tracing-subscriber` pipeline.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Installs the global subscriber. `RUST_LOG` wins over `config.level`.
///
/// Fails if a global logger or subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;

    tracing_log::LogTracer::init()?;

    let result = if config.json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true));
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true));
        tracing::subscriber::set_global_default(subscriber)
    };

    result.map_err(LoggingError::from)
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|source| LoggingError::Filter {
            level: config.level.clone(),
            source,
        })
}
