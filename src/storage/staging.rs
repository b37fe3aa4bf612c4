use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use super::StorageError;
use crate::filename::split_extension;

// Temporary home of uploads waiting for confirmation
#[derive(Clone, Debug)]
pub struct StagingArea {
    base_path: PathBuf,
}

impl StagingArea {
    pub async fn new(base_path: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path).await?;
        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Writes `content` to a fresh `<base>/<user_id>/<uuid><ext>`; every call
    /// gets its own file, whatever the name.
    pub async fn write(&self, user_id: i64, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let dir = self.base_path.join(user_id.to_string());
        fs::create_dir_all(&dir).await?;

        let (_, ext) = split_extension(filename);
        let path = dir.join(format!("{}{}", Uuid::new_v4(), ext));
        let mut file = fs::File::create(&path).await?;
        file.write_all(content).await?;
        file.flush().await?;

        tracing::info!("Staged upload at {:?}", path);

        Ok(path)
    }
}
