//! Two-step photo ingestion.
//!
//! `stage` keeps an upload in the staging area and answers with a preview and
//! the metadata it could recover; `commit` moves the staged file into the
//! owner's media directory, writes its thumbnail and records both in the
//! catalog together with the quota increment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::{
    catalog::{Catalog, CatalogError},
    config::Config,
    filename,
    geocoder::{self, Geocoder},
    imaging::{self, ImageError},
    metadata::{self, PhotoMetadata},
    models::{Confirmation, FORM_DATETIME_FORMAT, NewPhoto, Photo, StagedPreview},
    session::{StagedUpload, StagedUploads},
    storage::{self, MediaStorage, StagingArea, StorageError},
    utils::get_file_extension,
};

const ADDRESS_MAX_CHARS: usize = 255;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("staged upload not found, start again")]
    StagedUploadMissing,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Storage(StorageError::IoError(err))
    }
}

#[derive(Clone)]
pub struct Ingestor {
    allowed_extensions: Vec<String>,
    max_file_size: u64,
    media: MediaStorage,
    staging: StagingArea,
    staged: StagedUploads,
    geocoder: Arc<dyn Geocoder>,
    catalog: Arc<dyn Catalog>,
}

impl Ingestor {
    pub fn new(
        config: &Config,
        media: MediaStorage,
        staging: StagingArea,
        geocoder: Arc<dyn Geocoder>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            allowed_extensions: config.allowed_extensions.clone(),
            max_file_size: config.max_file_size,
            media,
            staging,
            staged: StagedUploads::new(config.staged_upload_ttl_secs),
            geocoder,
            catalog,
        }
    }

    fn check_upload(&self, original_filename: &str, size: u64) -> Result<(), IngestError> {
        let extension = get_file_extension(original_filename)
            .ok_or_else(|| IngestError::UnsupportedFileType(original_filename.to_string()))?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(IngestError::UnsupportedFileType(extension));
        }
        if size > self.max_file_size {
            return Err(IngestError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Idle -> Staged. Nothing is written to the catalog here.
    pub async fn stage(
        &self,
        user_id: i64,
        session_id: &str,
        original_filename: &str,
        data: Bytes,
    ) -> Result<StagedPreview, IngestError> {
        self.check_upload(original_filename, data.len() as u64)?;

        let preview = imaging::preview_async(data.clone()).await?;

        let safe_name = filename::storage_name(original_filename);
        let temp_path = self.staging.write(user_id, &safe_name, &data).await?;
        self.staged
            .put(
                session_id,
                StagedUpload {
                    temp_path: temp_path.clone(),
                    original_filename: original_filename.to_string(),
                },
            )
            .await;

        let meta = read_metadata(temp_path).await;
        let address =
            geocoder::address_from_coordinates(self.geocoder.as_ref(), meta.latitude, meta.longitude).await;

        info!("Staged {} for user {} ({} bytes)", safe_name, user_id, data.len());

        Ok(StagedPreview {
            preview,
            filename: safe_name,
            latitude: meta.latitude,
            longitude: meta.longitude,
            taken_at: meta.timestamp.map(|t| t.format(FORM_DATETIME_FORMAT).to_string()),
            address,
        })
    }

    /// Staged -> Committed. The staged temp file is gone afterwards whether or
    /// not the commit succeeded.
    pub async fn commit(
        &self,
        user_id: i64,
        session_id: &str,
        confirmation: Confirmation,
    ) -> Result<Photo, IngestError> {
        let staged = self
            .staged
            .take(session_id)
            .await
            .ok_or(IngestError::StagedUploadMissing)?;
        if !fs::try_exists(&staged.temp_path).await.unwrap_or(false) {
            return Err(IngestError::StagedUploadMissing);
        }

        let result = self.persist(user_id, &staged, confirmation).await;
        storage::discard(&staged.temp_path).await;
        result
    }

    async fn persist(
        &self,
        user_id: i64,
        staged: &StagedUpload,
        confirmation: Confirmation,
    ) -> Result<Photo, IngestError> {
        let (latitude, longitude) = self.resolve_coordinates(&confirmation).await;

        let dir = self.media.ensure_user_dir(user_id).await?;
        let desired = filename::storage_name(&staged.original_filename);
        let (stored_name, path) = MediaStorage::next_free_name(&dir, &desired).await?;
        let thumb_path = dir.join(filename::thumbnail_name(&stored_name));

        let photo = NewPhoto {
            user_id,
            filename: stored_name,
            latitude,
            longitude,
            address: confirmation
                .address
                .map(|a| a.chars().take(ADDRESS_MAX_CHARS).collect()),
            taken_at: confirmation.taken_at,
            description: confirmation.description,
        };

        match self.write_and_record(&staged.temp_path, &path, photo).await {
            Ok(row) => {
                info!("Stored {} for user {}", row.filename, user_id);
                Ok(row)
            }
            Err(e) => {
                warn!("Commit of {} failed: {}", path.display(), e);
                storage::discard(&path).await;
                storage::discard(&thumb_path).await;
                Err(e)
            }
        }
    }

    /// Form coordinates win when both are given; otherwise a non-blank address
    /// replaces them with whatever forward geocoding finds, nothing included.
    async fn resolve_coordinates(&self, confirmation: &Confirmation) -> (Option<f64>, Option<f64>) {
        match (confirmation.latitude, confirmation.longitude, confirmation.address.as_deref()) {
            (Some(lat), Some(lon), _) => (Some(lat), Some(lon)),
            (_, _, Some(address)) if !address.trim().is_empty() => {
                geocoder::coordinates_from_address(self.geocoder.as_ref(), address).await
            }
            (lat, lon, _) => (lat, lon),
        }
    }

    async fn write_and_record(&self, temp_path: &Path, path: &Path, photo: NewPhoto) -> Result<Photo, IngestError> {
        fs::copy(temp_path, path).await?;
        let thumb_path = imaging::thumbnail_async(path.to_path_buf()).await?;

        let bytes = fs::metadata(path).await?.len() + fs::metadata(&thumb_path).await?.len();
        let row = self.catalog.record_photo(photo, bytes as i64).await?;
        Ok(row)
    }
}

async fn read_metadata(path: PathBuf) -> PhotoMetadata {
    match tokio::task::spawn_blocking(move || metadata::extract(&path)).await {
        Ok(meta) => meta,
        Err(e) => {
            warn!("Metadata extraction task failed: {}", e);
            PhotoMetadata::default()
        }
    }
}
