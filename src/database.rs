use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    catalog::{Catalog, CatalogError},
    models::{NewPhoto, Photo, User},
};

/// Initialize a PostgreSQL connection pool and apply pending migrations.
pub async fn init_db(database_url: &str) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database...");

    // Create a new PostgreSQL connection pool with a maximum of 5 connections
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database connection established");
    Ok(pool)
}

/// Unique constraint names from the migrations, mapped to the offending field.
fn duplicate_field(err: &sqlx::Error) -> Option<&'static str> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    match db_err.constraint()? {
        "users_email_unique" => Some("email"),
        "users_login_unique" => Some("login"),
        "users_number_unique" => Some("number"),
        "photos_user_filename_unique" => Some("filename"),
        _ => None,
    }
}

fn map_err(err: sqlx::Error) -> CatalogError {
    match duplicate_field(&err) {
        Some(field) => CatalogError::Duplicate(field),
        None => CatalogError::Database(err),
    }
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_user(&self, user_id: i64) -> Result<User, CatalogError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, login, number, used_space, date_of_registration FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CatalogError::UserNotFound(user_id))
    }

    async fn record_photo(&self, photo: NewPhoto, bytes: i64) -> Result<Photo, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET used_space = used_space + $1 WHERE id = $2")
            .bind(bytes)
            .bind(photo.user_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(CatalogError::UserNotFound(photo.user_id));
        }

        let row = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (
                user_id, filename, latitude, longitude, address, taken_at, description
            ) VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING *
            "#,
        )
        .bind(photo.user_id)
        .bind(&photo.filename)
        .bind(photo.latitude)
        .bind(photo.longitude)
        .bind(&photo.address)
        .bind(photo.taken_at)
        .bind(&photo.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await?;

        info!("Photo recorded: {} for user {} (+{} bytes)", row.filename, row.user_id, bytes);
        Ok(row)
    }

    async fn list_photos(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError> {
        let rows = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_geotagged(&self, user_id: i64) -> Result<Vec<Photo>, CatalogError> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT * FROM photos
            WHERE user_id = $1 AND latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_photos(&self, user_id: i64) -> Result<i64, CatalogError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_profile(&self, user: &User) -> Result<(), CatalogError> {
        let updated = sqlx::query("UPDATE users SET login = $1, email = $2, number = $3 WHERE id = $4")
            .bind(&user.login)
            .bind(&user.email)
            .bind(&user.number)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if updated.rows_affected() == 0 {
            return Err(CatalogError::UserNotFound(user.id));
        }
        Ok(())
    }
}
