use axum::{Json,
    http::StatusCode,
    response::IntoResponse
};
use serde_json::json;
use thiserror::Error;

use crate::{catalog::CatalogError, imaging::ImageError, ingest::IngestError, storage::StorageError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnSupportedMediaType(String),

    #[error("Multipart error: {0}")]
    MultipartError(String),

    #[error("Image processing error: {0}")]
    ImageProcessingError(String),

    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFileType(ext) => {
                AppError::UnSupportedMediaType(format!("Unsupported file type: {}", ext))
            }
            IngestError::TooLarge { size, limit } => AppError::PayloadTooLarge(format!(
                "File size {} exceeds maximum limit of {} bytes",
                size, limit
            )),
            IngestError::StagedUploadMissing => {
                AppError::NotFound("File not found, start the upload again".to_string())
            }
            IngestError::Image(e) => AppError::ImageProcessingError(e.to_string()),
            IngestError::Storage(e) => e.into(),
            IngestError::Catalog(e) => e.into(),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            StorageError::InvalidName(name) => {
                AppError::Forbidden(format!("Invalid file name: {}", name))
            }
            other => {
                tracing::error!("Storage Error: {}", other);
                AppError::InternalServerError("Storage failure".to_string())
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UserNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            CatalogError::Duplicate("filename") => {
                AppError::Conflict("A photo with this filename already exists".to_string())
            }
            CatalogError::Duplicate(field) => {
                AppError::Conflict(format!("A user with this {} already exists", field))
            }
            CatalogError::Database(e) => e.into(),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        AppError::ImageProcessingError(err.to_string())
    }
}

/// Convert `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Map application errors to HTTP status codes and messages
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::MultipartError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ImageProcessingError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::UnSupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            AppError::DatabaseError(err) => {
                tracing::error!("Database Error: {:}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        // Return standardized JSON error response
        let body = Json(json!({"error": error_message}));
        (status, body).into_response()
    }
}
