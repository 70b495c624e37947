//! Structured logging setup.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Build the level filter. `RUST_LOG` wins over `level` when set.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level {level:?}")),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already
/// installed.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = env_filter(level)?;

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed(),
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(log_level = level, ?format, "Structured logging initialized");
    Ok(())
}
