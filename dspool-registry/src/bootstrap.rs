use std::path::Path;

use dspool_config::{DiscoveryError, LoadSettingsError, load_settings_from, run_discovery};
use thiserror::Error;
use tracing::info;

use crate::options::PoolConfigError;
use crate::registry::PoolRegistry;

/// Errors that abort bootstrap. Each stage's failure is surfaced
/// immediately; there are no retries.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The bootstrap settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] LoadSettingsError),

    /// The discovery phase failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A merged bundle could not be turned into a pool.
    #[error(transparent)]
    Pool(#[from] PoolConfigError),
}

/// Runs one full bootstrap rooted at the current working directory.
pub fn bootstrap() -> Result<PoolRegistry, BootstrapError> {
    let base_dir = std::env::current_dir().map_err(LoadSettingsError::CurrentDir)?;
    bootstrap_from(&base_dir)
}

/// Runs one full bootstrap rooted at `base_dir`: load settings, run the
/// discovery phase, and build the pool registry from the resulting bundles.
pub fn bootstrap_from(base_dir: &Path) -> Result<PoolRegistry, BootstrapError> {
    let settings = load_settings_from(base_dir)?;
    let bundles = run_discovery(&settings, base_dir)?;
    let registry = PoolRegistry::from_bundles(bundles, settings.fill_pool_name)?;

    info!(pools = registry.len(), "data source bootstrap complete");

    Ok(registry)
}
