//! Subscriber setup for binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise `config.filter`.
///
/// # Errors
///
/// Returns an error if neither source holds a valid filter directive.
pub fn env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| anyhow::anyhow!("invalid log filter {:?}: {e}", config.filter))
}

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error for an invalid filter or when a global subscriber is
/// already installed.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
