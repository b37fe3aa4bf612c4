use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::storage::discard;

pub const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

/// An upload written to the staging area, waiting for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedUpload {
    pub temp_path: PathBuf,
    pub original_filename: String,
}

#[derive(Debug)]
struct Entry {
    upload: StagedUpload,
    expires_at: DateTime<Utc>,
}

/// Session id -> staged upload, with expiry.
#[derive(Clone)]
pub struct StagedUploads {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl StagedUploads {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    /// Records `upload` for the session. The previous upload of the session
    /// and every expired one lose their temp files.
    pub async fn put(&self, session_id: &str, upload: StagedUpload) {
        let now = Utc::now();
        let keep = upload.temp_path.clone();
        let mut stale = Vec::new();
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, entry| {
                if entry.expires_at <= now {
                    stale.push(entry.upload.temp_path.clone());
                    false
                } else {
                    true
                }
            });

            let entry = Entry {
                upload,
                expires_at: now + self.ttl,
            };
            if let Some(previous) = entries.insert(session_id.to_string(), entry) {
                stale.push(previous.upload.temp_path);
            }
        }
        // The new upload may have been written over an older one's path.
        stale.retain(|path| *path != keep);

        if !stale.is_empty() {
            info!("Discarding {} abandoned staged upload(s)", stale.len());
        }
        for path in stale {
            discard(&path).await;
        }
    }

    /// Removes and returns the session's upload. Expired entries count as missing.
    pub async fn take(&self, session_id: &str) -> Option<StagedUpload> {
        let entry = self.entries.lock().await.remove(session_id)?;
        if entry.expires_at <= Utc::now() {
            discard(&entry.upload.temp_path).await;
            return None;
        }
        Some(entry.upload)
    }
}
