use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::ingest::Ingestor;
use crate::storage::MediaStorage;

/// Central application state shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Photo catalog and user accounting (PostgreSQL in production).
    pub catalog: Arc<dyn Catalog>,

    /// Per-user media library on disk.
    pub media: MediaStorage,

    /// Stage-then-commit upload pipeline.
    pub ingestor: Ingestor,

    /// Application configuration loaded from environment variables or `.env`.
    pub config: Arc<Config>,
}
