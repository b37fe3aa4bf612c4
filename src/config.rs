use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use dotenvy::dotenv;
use validator::Validate;

pub const DEFAULT_ALLOWED_EXTENSIONS: &str = ".jpg,.jpeg,.png,.gif,.svg,.webp,.bmp,.ico";
const MAX_UPLOAD_BYTES: u64 = 128 * 1024 * 1024;

#[derive(Debug, Clone, Validate)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub media_dir: PathBuf,
    pub staging_dir: PathBuf,
    #[validate(range(min = 1, max = 134217728))] // Max 128MB
    pub max_file_size: u64,
    /// Lowercase extensions including the leading dot.
    pub allowed_extensions: Vec<String>,
    pub geocoder: GeocoderConfig,
    #[validate(range(min = 1, max = 2592000))] // 30 days
    pub staged_upload_ttl_secs: u64,
    pub storage_quota_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// Without a key every lookup resolves to nothing.
    pub api_key: Option<String>,
    pub url: String,
    pub lang: String,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();

        let allowed_extensions = parse_extensions(
            &env::var("ALLOWED_EXTENSIONS").unwrap_or_else(|_| DEFAULT_ALLOWED_EXTENSIONS.to_string()),
        );

        let config = Config {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL")?,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
                .parse()
                .context("BIND_ADDR")?,
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string()).into(),
            staging_dir: env::var("STAGING_DIR")
                .unwrap_or_else(|_| "tmp_uploads".to_string())
                .into(),
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_UPLOAD_BYTES),
            allowed_extensions,
            geocoder: GeocoderConfig {
                api_key: env::var("GEOCODE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                url: env::var("GEOCODER_URL")
                    .unwrap_or_else(|_| "https://geocode-maps.yandex.ru/1.x/".to_string()),
                lang: env::var("GEOCODER_LANG").unwrap_or_else(|_| "ru_RU".to_string()),
                timeout: Duration::from_secs(
                    env::var("GEOCODER_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(5),
                ),
            },
            staged_upload_ttl_secs: env::var("STAGED_UPLOAD_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            storage_quota_bytes: env::var("STORAGE_QUOTA_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4 * 1024 * 1024 * 1024),
        };

        // Validate configuration values (e.g. file size range)
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Accepts both `jpg` and `.jpg` spellings.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| if s.starts_with('.') { s } else { format!(".{s}") })
        .collect()
}

#[cfg(test)]
impl Config {
    pub fn for_tests(root: &std::path::Path) -> Self {
        Config {
            database_url: String::new(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            media_dir: root.join("media"),
            staging_dir: root.join("tmp_uploads"),
            max_file_size: MAX_UPLOAD_BYTES,
            allowed_extensions: parse_extensions(DEFAULT_ALLOWED_EXTENSIONS),
            geocoder: GeocoderConfig {
                api_key: None,
                url: String::new(),
                lang: "ru_RU".to_string(),
                timeout: Duration::from_secs(1),
            },
            staged_upload_ttl_secs: 3600,
            storage_quota_bytes: 4 * 1024 * 1024 * 1024,
        }
    }
}
