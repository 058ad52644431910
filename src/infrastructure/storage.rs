use crate::config::CloudConfig;
use crate::services::remote::{CloudinaryStore, RemoteStore};
use crate::services::staging::StagingStore;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Creates the staging directory if needed and returns the store over it.
pub fn setup_staging(dir: &Path) -> Result<StagingStore> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create staging directory {}", dir.display()))?;

    info!("📁 Staging directory: {}", dir.display());
    Ok(StagingStore::new(dir))
}

/// Builds the remote commit client from environment credentials.
pub fn setup_remote() -> Result<Arc<dyn RemoteStore>> {
    let config = CloudConfig::from_env()?;
    info!(
        "☁️  Remote asset store: {} (cloud: {})",
        config.api_base, config.cloud_name
    );

    Ok(Arc::new(CloudinaryStore::new(config)))
}
