use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Form date-time format used for pre-filling and reading `taken_at`.
pub const FORM_DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub taken_at: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A catalog row before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub user_id: i64,
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub taken_at: Option<NaiveDateTime>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub login: Option<String>,
    pub number: Option<String>,
    pub used_space: i64,
    pub date_of_registration: NaiveDate,
}

/// Response of the staging request: preview plus pre-filled form values.
#[derive(Debug, Clone, Serialize)]
pub struct StagedPreview {
    pub preview: String,
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub taken_at: Option<String>,
    pub address: Option<String>,
}

/// Confirmation form as submitted; blank fields count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmForm {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub address: Option<String>,
    pub taken_at: Option<String>,
    pub description: Option<String>,
}

/// User-supplied overrides for a staged upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Confirmation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub taken_at: Option<NaiveDateTime>,
    pub description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_form_datetime(raw: &str) -> Option<NaiveDateTime> {
    [FORM_DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

impl From<ConfirmForm> for Confirmation {
    fn from(form: ConfirmForm) -> Self {
        let number = |v: Option<String>| non_blank(v).and_then(|v| v.replace(',', ".").parse::<f64>().ok());
        Confirmation {
            latitude: number(form.latitude),
            longitude: number(form.longitude),
            address: non_blank(form.address),
            taken_at: non_blank(form.taken_at).and_then(|v| parse_form_datetime(&v)),
            description: non_blank(form.description),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GalleryItem {
    pub filename: String,
    pub full: String,
    pub thumb: String,
}

#[derive(Debug, Serialize)]
pub struct GeoRecord {
    pub lat: f64,
    pub lon: f64,
    pub thumb: String,
    pub full: String,
    pub address: Option<String>,
    pub timestamp: Option<String>,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub login: Option<String>,
    pub email: Option<String>,
    pub number: Option<String>,
    pub photos: i64,
    pub used_space: String,
    pub quota: String,
    pub used_percent: f64,
    pub registered: String,
    pub days_message: String,
}
