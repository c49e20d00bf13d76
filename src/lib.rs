//! # rstflow
//!
//! Finite-state workflow engine. Re-exports [`rstflow_core`] and provides the
//! process-level bootstrap for logging and configuration.

pub use rstflow_core::*;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .is_ok()
}

/// Loads the engine configuration (from file if RSTFLOW_CONFIG is set, then
/// env overrides).
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    match EngineConfig::load() {
        Ok(config) => {
            match std::env::var("RSTFLOW_CONFIG") {
                Ok(path) => tracing::info!("Loaded config from {}", path),
                Err(_) => tracing::debug!("Using default configuration"),
            }
            Ok(config)
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            Err(e)
        }
    }
}

/// A builder seeded from [`load_config`].
pub fn configured_builder<T>() -> Result<SpecificationBuilder<T>, ConfigError> {
    let config = load_config()?;
    tracing::debug!(
        "Builder options: revert_events={} strict_targets={}",
        config.revert_events,
        config.strict_targets
    );
    Ok(SpecificationBuilder::with_config(&config))
}
