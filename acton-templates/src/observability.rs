//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Initialize JSON-formatted tracing
///
/// The filter comes from `service.log_level` and falls back to `info` when
/// the directive cannot be parsed. Calling this when a global subscriber is
/// already installed leaves that subscriber in place.
///
/// # Errors
///
/// None at present: the function always returns `Ok`.
pub fn init_tracing(config: &Config) -> Result<()> {
    let log_level = config.service.log_level.clone();

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialized for service: {}", config.service.name);
    } else {
        tracing::debug!("Global tracing subscriber already set");
    }

    Ok(())
}
