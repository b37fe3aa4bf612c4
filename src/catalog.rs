use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewPhoto, Photo, User};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistent photo catalog and per-user accounting.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<User, CatalogError>;

    /// Insert `photo` and add `bytes` to the owner's `used_space`, all or nothing.
    async fn record_photo(&self, photo: NewPhoto, bytes: i64) -> Result<Photo, CatalogError>;

    /// Newest first.
    async fn list_photos(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError>;

    /// Photos with both coordinates set.
    async fn list_geotagged(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError>;

    async fn count_photos(&self, user_id: i64) -> Result<i64, CatalogError>;

    /// Persist the editable profile fields of `user`.
    async fn update_profile(&self, user: &User) -> Result<(), CatalogError>;
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Tables {
        users: Vec<User>,
        photos: Vec<Photo>,
    }

    /// In-process catalog; `fail_next_insert` simulates a failed transaction.
    #[derive(Default)]
    pub struct MemoryCatalog {
        tables: Mutex<Tables>,
        pub fail_next_insert: AtomicBool,
    }

    impl MemoryCatalog {
        pub fn with_user(user_id: i64) -> Self {
            let catalog = Self::default();
            catalog.add_user(User {
                id: user_id,
                email: Some(format!("user{}@example.com", user_id)),
                login: Some(format!("user{}", user_id)),
                number: None,
                used_space: 0,
                date_of_registration: Utc::now().date_naive(),
            });
            catalog
        }

        pub fn add_user(&self, user: User) {
            self.tables.lock().unwrap().users.push(user);
        }

        pub fn used_space(&self, user_id: i64) -> i64 {
            let tables = self.tables.lock().unwrap();
            tables.users.iter().find(|u| u.id == user_id).map_or(0, |u| u.used_space)
        }

        pub fn photos(&self) -> Vec<Photo> {
            self.tables.lock().unwrap().photos.clone()
        }
    }

    #[async_trait]
    impl Catalog for MemoryCatalog {
        async fn find_user(&self, user_id: i64) -> Result<User, CatalogError> {
            let tables = self.tables.lock().unwrap();
            tables
                .users
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or(CatalogError::UserNotFound(user_id))
        }

        async fn record_photo(&self, photo: NewPhoto, bytes: i64) -> Result<Photo, CatalogError> {
            if self.fail_next_insert.swap(false, Ordering::SeqCst) {
                return Err(CatalogError::Database(sqlx::Error::PoolClosed));
            }

            let mut tables = self.tables.lock().unwrap();
            if tables
                .photos
                .iter()
                .any(|p| p.user_id == photo.user_id && p.filename == photo.filename)
            {
                return Err(CatalogError::Duplicate("filename"));
            }
            let user = tables
                .users
                .iter_mut()
                .find(|u| u.id == photo.user_id)
                .ok_or(CatalogError::UserNotFound(photo.user_id))?;
            user.used_space += bytes;

            let row = Photo {
                id: tables.photos.len() as i64 + 1,
                user_id: photo.user_id,
                filename: photo.filename,
                latitude: photo.latitude,
                longitude: photo.longitude,
                address: photo.address,
                taken_at: photo.taken_at,
                description: photo.description,
                created_at: Utc::now(),
            };
            tables.photos.push(row.clone());
            Ok(row)
        }

        async fn list_photos(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError> {
            let tables = self.tables.lock().unwrap();
            let mut rows: Vec<Photo> = tables.photos.iter().filter(|p| p.user_id == user_id).cloned().collect();
            rows.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(rows)
        }

        async fn list_geotagged(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError> {
            let rows = self.list_photos(user_id).await?;
            Ok(rows
                .into_iter()
                .filter(|p| p.latitude.is_some() && p.longitude.is_some())
                .collect())
        }

        async fn count_photos(&self, user_id: i64) -> Result<i64, CatalogError> {
            Ok(self.list_photos(user_id).await?.len() as i64)
        }

        async fn update_profile(&self, user: &User) -> Result<(), CatalogError> {
            let mut tables = self.tables.lock().unwrap();
            let clash = |field: fn(&User) -> &Option<String>| {
                field(user).is_some()
                    && tables.users.iter().any(|u| u.id != user.id && field(u) == field(user))
            };
            if clash(|u| &u.login) {
                return Err(CatalogError::Duplicate("login"));
            }
            if clash(|u| &u.email) {
                return Err(CatalogError::Duplicate("email"));
            }
            if clash(|u| &u.number) {
                return Err(CatalogError::Duplicate("number"));
            }

            let stored = tables
                .users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(CatalogError::UserNotFound(user.id))?;
            stored.login = user.login.clone();
            stored.email = user.email.clone();
            stored.number = user.number.clone();
            Ok(())
        }
    }
}
