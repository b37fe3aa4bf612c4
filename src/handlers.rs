use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    auth::CurrentUser,
    error::AppError,
    filename::thumbnail_name,
    ingest::IngestError,
    models::*,
    state::AppState,
};

pub const GALLERY_ROUTE: &str = "/photos";
pub const MISSING_UPLOAD_REDIRECT: &str = "/upload?notice=staged-upload-missing";

/// Public locator of a stored file.
pub fn media_url(filename: &str) -> String {
    format!("/photos/{}/file", filename)
}

#[derive(Debug, Deserialize)]
pub struct UploadPageQuery {
    pub notice: Option<String>,
}

/// Upload form defaults plus any notice carried by a redirect.
pub async fn upload_page(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<UploadPageQuery>,
) -> Json<Value> {
    Json(json!({
        "notice": query.notice,
        "allowed_extensions": state.config.allowed_extensions,
    }))
}

/// Stage an uploaded photo using multipart/form-data.
pub async fn upload_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<StagedPreview>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    // Parse multipart fields
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Error parsing multipart: {}", e);
        AppError::MultipartError(format!("Failed to parse multipart form: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or("uploaded.jpg").to_string();
        // Read file bytes
        let data = field.bytes().await.map_err(|e| {
            error!("Error reading file bytes: {}", e);
            AppError::MultipartError(format!("Failed to read the file: {}", e))
        })?;
        upload = Some((original_filename, data));
    }

    // Ensure file exists
    let (original_filename, data) = upload.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;

    let preview = state
        .ingestor
        .stage(user.user_id, &user.session_id, &original_filename, data)
        .await
        .map_err(|e| {
            error!("Staging {} failed: {}", original_filename, e);
            AppError::from(e)
        })?;

    Ok(Json(preview))
}

/// Confirm the staged upload; redirects to the gallery.
pub async fn confirm_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ConfirmForm>,
) -> Result<Redirect, AppError> {
    match state
        .ingestor
        .commit(user.user_id, &user.session_id, form.into())
        .await
    {
        Ok(photo) => {
            info!("Photo added: {} (user {})", photo.filename, user.user_id);
            Ok(Redirect::to(GALLERY_ROUTE))
        }
        Err(IngestError::StagedUploadMissing) => Ok(Redirect::to(MISSING_UPLOAD_REDIRECT)),
        Err(e) => Err(e.into()),
    }
}

/// Gallery listing, newest first.
pub async fn list_photos(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<GalleryItem>>, AppError> {
    let photos = state.catalog.list_photos(user.user_id).await?;

    let response = photos
        .into_iter()
        .map(|photo| GalleryItem {
            full: media_url(&photo.filename),
            thumb: media_url(&thumbnail_name(&photo.filename)),
            filename: photo.filename,
        })
        .collect();

    Ok(Json(response))
}

/// Every geotagged photo of the caller, for the map view.
pub async fn photos_geo(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<GeoRecord>>, AppError> {
    let photos = state.catalog.list_geotagged(user.user_id).await?;

    let records = photos
        .into_iter()
        .filter_map(|photo| {
            let (lat, lon) = (photo.latitude?, photo.longitude?);
            Some(GeoRecord {
                lat,
                lon,
                thumb: media_url(&thumbnail_name(&photo.filename)),
                full: media_url(&photo.filename),
                address: photo.address,
                timestamp: photo.taken_at.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                description: photo.description.unwrap_or_default(),
            })
        })
        .collect();

    Ok(Json(records))
}

/// Serve an original or thumbnail from the caller's own directory.
pub async fn get_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let content = state.media.read(user.user_id, &filename).await?;

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        content,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn missing_upload_redirect_points_back_to_the_form() {
        let response = Redirect::to(MISSING_UPLOAD_REDIRECT).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], MISSING_UPLOAD_REDIRECT);
    }

    use std::sync::Arc;

    use crate::catalog::memory::MemoryCatalog;
    use crate::config::Config;
    use crate::geocoder::stub::StubGeocoder;
    use crate::ingest::Ingestor;
    use crate::metadata::fixtures;
    use crate::models::Confirmation;
    use crate::storage::{MediaStorage, StagingArea};

    async fn app_state(root: &std::path::Path) -> AppState {
        let config = Config::for_tests(root);
        let media = MediaStorage::new(&config.media_dir).await.unwrap();
        let staging = StagingArea::new(&config.staging_dir).await.unwrap();
        let catalog = Arc::new(MemoryCatalog::with_user(1));
        catalog.add_user(crate::models::User {
            id: 2,
            email: None,
            login: None,
            number: None,
            used_space: 0,
            date_of_registration: chrono::Utc::now().date_naive(),
        });
        let ingestor = Ingestor::new(
            &config,
            media.clone(),
            staging,
            Arc::new(StubGeocoder::default()),
            catalog.clone(),
        );
        AppState {
            catalog,
            media,
            ingestor,
            config: Arc::new(config),
        }
    }

    fn caller(user_id: i64) -> CurrentUser {
        CurrentUser {
            user_id,
            session_id: format!("user-{}", user_id),
        }
    }

    async fn store(state: &AppState, name: &str, jpeg: Vec<u8>, confirmation: Confirmation) {
        state
            .ingestor
            .stage(1, "user-1", name, Bytes::from(jpeg))
            .await
            .unwrap();
        state.ingestor.commit(1, "user-1", confirmation).await.unwrap();
    }

    #[tokio::test]
    async fn confirm_without_staged_upload_redirects_to_form() {
        let root = tempfile::tempdir().unwrap();
        let state = app_state(root.path()).await;

        let redirect = confirm_upload(State(state), caller(1), Form(ConfirmForm::default()))
            .await
            .unwrap()
            .into_response();
        assert_eq!(redirect.headers()[header::LOCATION], MISSING_UPLOAD_REDIRECT);
    }

    #[tokio::test]
    async fn geodata_lists_only_geotagged_photos() {
        let root = tempfile::tempdir().unwrap();
        let state = app_state(root.path()).await;

        store(&state, "plain.jpg", fixtures::plain_jpeg(8, 8), Confirmation::default()).await;
        store(
            &state,
            "kremlin.jpg",
            fixtures::plain_jpeg(8, 8),
            Confirmation {
                latitude: Some(55.7520),
                longitude: Some(37.6175),
                taken_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 9)
                    .unwrap()
                    .and_hms_opt(10, 0, 0),
                ..Default::default()
            },
        )
        .await;

        let Json(records) = photos_geo(State(state.clone()), caller(1)).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!((record.lat, record.lon), (55.7520, 37.6175));
        assert_eq!(record.full, "/photos/kremlin.jpg/file");
        assert_eq!(record.thumb, "/photos/kremlin_tmb.jpg/file");
        assert_eq!(record.timestamp.as_deref(), Some("2024-05-09T10:00:00"));
        assert_eq!(record.description, "");

        let Json(gallery) = list_photos(State(state), caller(1)).await.unwrap();
        let names: Vec<_> = gallery.iter().map(|g| g.filename.as_str()).collect();
        assert_eq!(names, ["kremlin.jpg", "plain.jpg"]);
    }

    #[tokio::test]
    async fn media_is_served_to_its_owner_only() {
        let root = tempfile::tempdir().unwrap();
        let state = app_state(root.path()).await;
        store(&state, "cat.jpg", fixtures::plain_jpeg(8, 8), Confirmation::default()).await;

        let response = get_photo(State(state.clone()), caller(1), Path("cat_tmb.jpg".into()))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        assert!(matches!(
            get_photo(State(state.clone()), caller(2), Path("cat.jpg".into())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_photo(State(state), caller(2), Path("../1/cat.jpg".into())).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn media_locators() {
        assert_eq!(media_url("photo_0.jpg"), "/photos/photo_0.jpg/file");
        assert_eq!(media_url(&thumbnail_name("photo_0.jpg")), "/photos/photo_0_tmb.jpg/file");
    }
}
