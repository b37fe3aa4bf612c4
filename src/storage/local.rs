use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;

use super::StorageError;
use crate::filename::{secure, split_extension, thumbnail_name};

// Per-user media library on the local filesystem
#[derive(Clone, Debug)]
pub struct MediaStorage {
    base_path: PathBuf, // <base>/<user_id>/<file>
}

impl MediaStorage {
    /// Creates a new MediaStorage instance and ensures the base directory exists
    pub async fn new(base_path: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path).await?;
        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn user_dir(&self, user_id: i64) -> PathBuf {
        self.base_path.join(user_id.to_string())
    }

    pub async fn ensure_user_dir(&self, user_id: i64) -> Result<PathBuf, StorageError> {
        let dir = self.user_dir(user_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// First name of `filename`, `stem_0.ext`, `stem_1.ext`... that is free in
    /// `dir` together with its `_tmb` companion.
    ///
    /// This is a scan, not a reservation: two writers in the same directory can
    /// pick the same name.
    pub async fn next_free_name(dir: &Path, filename: &str) -> Result<(String, PathBuf), StorageError> {
        let mut candidate = filename.to_string();
        let mut path = dir.join(&candidate);
        let (stem, ext) = split_extension(filename);

        let mut n: u64 = 0;
        while fs::try_exists(&path).await? || fs::try_exists(dir.join(thumbnail_name(&candidate))).await? {
            candidate = format!("{}_{}{}", stem, n, ext);
            path = dir.join(&candidate);
            n += 1;
        }
        Ok((candidate, path))
    }

    /// Resolve a stored file inside the user's directory only.
    pub async fn resolve(&self, user_id: i64, filename: &str) -> Result<PathBuf, StorageError> {
        if filename.is_empty() || secure(filename) != filename {
            return Err(StorageError::InvalidName(filename.to_string()));
        }

        let path = self.user_dir(user_id).join(filename);
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    pub async fn read(&self, user_id: i64, filename: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(user_id, filename).await?;
        let content = fs::read(&path).await?;
        Ok(Bytes::from(content))
    }
}
