//! Tracing subscriber setup

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`; `verbose` raises the crate's own
/// events to debug when `RUST_LOG` is unset. Returns an error if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        format!("{},forma=debug", config.level)
    } else {
        config.level.clone()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (pretty, json) = match config.format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(false).with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|e| AppError::Configuration(format!("Failed to initialise tracing: {}", e)))
}
