use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed geocoder response: {0}")]
    Malformed(String),
}

/// Outcome of one geocoder lookup.
#[derive(Debug)]
pub enum Lookup<T> {
    Resolved(T),
    NotFound,
    Failed(GeocodeError),
}

impl<T> Lookup<T> {
    /// Collapse to an `Option`, logging failures. Ingestion only sees this.
    pub fn into_option(self, query: &str) -> Option<T> {
        match self {
            Lookup::Resolved(value) => Some(value),
            Lookup::NotFound => {
                debug!("Geocoder found nothing for {}", query);
                None
            }
            Lookup::Failed(e) => {
                warn!("Geocoding {} failed: {}", query, e);
                None
            }
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Coordinates to the first matching address.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Lookup<String>;

    /// Free text to the first matching `(latitude, longitude)`.
    async fn forward(&self, address: &str) -> Lookup<(f64, f64)>;
}

/// Address for a position; no request is made unless both halves are known.
pub async fn address_from_coordinates(
    geocoder: &dyn Geocoder,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<String> {
    let (lat, lon) = (latitude?, longitude?);
    geocoder
        .reverse(lat, lon)
        .await
        .into_option(&format!("({}, {})", lat, lon))
}

pub async fn coordinates_from_address(geocoder: &dyn Geocoder, address: &str) -> (Option<f64>, Option<f64>) {
    let address = address.trim();
    if address.is_empty() {
        return (None, None);
    }
    match geocoder.forward(address).await.into_option(address) {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    }
}

// Yandex geocoder HTTP API (response subset)

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    features: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
struct GeoObject {
    #[serde(rename = "metaDataProperty")]
    meta: Option<MetaDataProperty>,
    #[serde(rename = "Point")]
    point: Option<Point>,
}

#[derive(Debug, Deserialize)]
struct MetaDataProperty {
    #[serde(rename = "GeocoderMetaData")]
    geocoder: GeocoderMetaData,
}

#[derive(Debug, Deserialize)]
struct GeocoderMetaData {
    text: String,
}

#[derive(Debug, Deserialize)]
struct Point {
    pos: String,
}

fn first_address(body: GeocodeResponse) -> Lookup<String> {
    let Some(first) = body.response.collection.features.into_iter().next() else {
        return Lookup::NotFound;
    };
    match first.geo_object.meta {
        Some(meta) => Lookup::Resolved(meta.geocoder.text),
        None => Lookup::Failed(GeocodeError::Malformed("feature without metaDataProperty".into())),
    }
}

/// `pos` is "<lon> <lat>".
fn first_point(body: GeocodeResponse) -> Lookup<(f64, f64)> {
    let Some(first) = body.response.collection.features.into_iter().next() else {
        return Lookup::NotFound;
    };
    let Some(point) = first.geo_object.point else {
        return Lookup::Failed(GeocodeError::Malformed("feature without Point".into()));
    };

    let mut parts = point.pos.split_whitespace().map(str::parse::<f64>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(lon)), Some(Ok(lat)), None) => Lookup::Resolved((lat, lon)),
        _ => Lookup::Failed(GeocodeError::Malformed(format!("bad pos {:?}", point.pos))),
    }
}

#[derive(Clone)]
pub struct YandexGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl YandexGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn query(&self, geocode: &str, results: Option<u32>) -> Result<Option<GeocodeResponse>, GeocodeError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("Geocoder disabled, no API key configured");
            return Ok(None);
        };

        let mut params = vec![
            ("apikey", api_key.to_string()),
            ("geocode", geocode.to_string()),
            ("format", "json".to_string()),
            ("lang", self.config.lang.clone()),
        ];
        if let Some(n) = results {
            params.push(("results", n.to_string()));
        }

        let body = self
            .client
            .get(&self.config.url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<GeocodeResponse>()
            .await?;
        Ok(Some(body))
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Lookup<String> {
        match self.query(&format!("{},{}", longitude, latitude), None).await {
            Ok(Some(body)) => first_address(body),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e),
        }
    }

    async fn forward(&self, address: &str) -> Lookup<(f64, f64)> {
        match self.query(address, Some(1)).await {
            Ok(Some(body)) => first_point(body),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::stub::StubGeocoder;
    use super::*;

    const FOUND: &str = r#"{
        "response": {"GeoObjectCollection": {"featureMember": [
            {"GeoObject": {
                "metaDataProperty": {"GeocoderMetaData": {"text": "Россия, Москва, Красная площадь"}},
                "Point": {"pos": "37.6173 55.7558"}
            }}
        ]}}
    }"#;

    const EMPTY: &str = r#"{"response": {"GeoObjectCollection": {"featureMember": []}}}"#;

    fn body(json: &str) -> GeocodeResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn reads_first_address() {
        match first_address(body(FOUND)) {
            Lookup::Resolved(text) => assert_eq!(text, "Россия, Москва, Красная площадь"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pos_is_longitude_first() {
        match first_point(body(FOUND)) {
            Lookup::Resolved(point) => assert_eq!(point, (55.7558, 37.6173)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_collection_is_not_found() {
        assert!(matches!(first_address(body(EMPTY)), Lookup::NotFound));
        assert!(matches!(first_point(body(EMPTY)), Lookup::NotFound));
    }

    #[test]
    fn garbled_pos_is_a_failure() {
        let json = FOUND.replace("37.6173 55.7558", "somewhere");
        assert!(matches!(first_point(body(&json)), Lookup::Failed(_)));
    }

    #[tokio::test]
    async fn missing_latitude_skips_the_request() {
        let geocoder = StubGeocoder {
            address: Some("anywhere".into()),
            ..Default::default()
        };
        assert_eq!(address_from_coordinates(&geocoder, None, Some(37.6)).await, None);
        assert_eq!(address_from_coordinates(&geocoder, Some(55.7), None).await, None);
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn failures_degrade_to_none() {
        let geocoder = StubGeocoder {
            unreachable: true,
            ..Default::default()
        };
        assert_eq!(address_from_coordinates(&geocoder, Some(1.0), Some(2.0)).await, None);
        assert_eq!(coordinates_from_address(&geocoder, "Moscow").await, (None, None));
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn blank_address_is_not_looked_up() {
        let geocoder = StubGeocoder::default();
        assert_eq!(coordinates_from_address(&geocoder, "   ").await, (None, None));
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn disabled_client_resolves_nothing() {
        let geocoder = YandexGeocoder::new(GeocoderConfig {
            api_key: None,
            url: "http://127.0.0.1:9/".into(),
            lang: "ru_RU".into(),
            timeout: std::time::Duration::from_millis(100),
        })
        .unwrap();
        assert!(matches!(geocoder.reverse(55.0, 37.0).await, Lookup::NotFound));
        assert!(matches!(geocoder.forward("Moscow").await, Lookup::NotFound));
    }
}
