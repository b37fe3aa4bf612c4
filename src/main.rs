mod auth;
mod catalog;
mod config;
mod database;
mod error;
mod filename;
mod geocoder;
mod handlers;
mod imaging;
mod ingest;
mod metadata;
mod models;
mod profile;
mod session;
mod state;
mod storage;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use tracing::info;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    database::{init_db, PgCatalog},
    geocoder::YandexGeocoder,
    handlers::{confirm_upload, get_photo, list_photos, photos_geo, upload_page, upload_photo},
    ingest::Ingestor,
    profile::{get_profile, update_profile},
    state::AppState,
    storage::init_storage,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = init_db(&config.database_url)
        .await
        .context("Failed to connect to db")?;
    let catalog = Arc::new(PgCatalog::new(pool));

    let (media, staging) = init_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    if config.geocoder.api_key.is_none() {
        info!("GEOCODE_API_KEY is not set; addresses will not be resolved");
    }
    let geocoder = Arc::new(YandexGeocoder::new(config.geocoder.clone())?);

    let ingestor = Ingestor::new(&config, media.clone(), staging, geocoder, catalog.clone());

    let addr = config.bind_addr;
    // Room for the multipart envelope around the largest accepted file
    let body_limit = config.max_file_size as usize + 64 * 1024;
    let app_state = AppState {
        catalog,
        media,
        ingestor,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/upload", get(upload_page).post(upload_photo))
        .route("/upload/confirm", post(confirm_upload))
        .route("/photos", get(list_photos))
        .route("/photos/geo", get(photos_geo))
        .route("/photos/{filename}/file", get(get_photo))
        .route("/profile", get(get_profile).patch(update_profile))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
