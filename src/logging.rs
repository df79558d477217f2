//! Log subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies. Output
//! is either the human-readable `fmt` layer or one JSON object per line.

use crate::config::{LogFormat, LoggingConfig};
use tracing::Subscriber;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter from `RUST_LOG`, else from `config.level`, else `info`.
fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build the subscriber for `config` without installing it.
pub fn subscriber(config: &LoggingConfig) -> Box<dyn Subscriber + Send + Sync> {
    let registry = tracing_subscriber::registry().with(filter(config));
    match config.format {
        LogFormat::Pretty => Box::new(registry.with(fmt::layer())),
        LogFormat::Json => Box::new(registry.with(fmt::layer().json())),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    subscriber(config).try_init()
}
