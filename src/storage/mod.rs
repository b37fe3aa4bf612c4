// Submodules for the permanent media library and the staging area
mod local;
mod staging;

use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

pub use local::MediaStorage;
pub use staging::StagingArea;

use crate::config::Config;

// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String), // Returned when a file cannot be found

    #[error("Invalid file name: {0}")]
    InvalidName(String), // Name would escape the user directory

    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error), // Wraps standard I/O errors
}

/// Remove a file, treating "already gone" as success.
pub async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

// Initialize both storage roots based on config
pub async fn init_storage(config: &Config) -> Result<(MediaStorage, StagingArea), StorageError> {
    info!("Initializing media storage at {}", config.media_dir.display());
    let media = MediaStorage::new(&config.media_dir).await?;
    info!("Initializing staging area at {}", config.staging_dir.display());
    let staging = StagingArea::new(&config.staging_dir).await?;
    Ok((media, staging))
}
