use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use serde::Serialize;
use tracing::debug;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Position and capture time recovered from EXIF; every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhotoMetadata {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Read EXIF metadata from an image file. Missing or broken EXIF is not an error.
pub fn extract(path: &Path) -> PhotoMetadata {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("Cannot open {} for EXIF: {}", path.display(), e);
            return PhotoMetadata::default();
        }
    };

    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => from_exif(&exif),
        Err(e) => {
            debug!("No EXIF in {}: {}", path.display(), e);
            PhotoMetadata::default()
        }
    }
}

fn from_exif(exif: &Exif) -> PhotoMetadata {
    let (latitude, longitude) = match decimal_coords(exif) {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    PhotoMetadata {
        latitude,
        longitude,
        timestamp: capture_time(exif),
    }
}

fn decimal_coords(exif: &Exif) -> Option<(f64, f64)> {
    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'N', b'S')?;
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'E', b'W')?;
    Some((round6(latitude), round6(longitude)))
}

fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, positive: u8, negative: u8) -> Option<f64> {
    let value = &exif.get_field(value_tag, In::PRIMARY)?.value;
    let reference = &exif.get_field(ref_tag, In::PRIMARY)?.value;

    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }

    let mut dms = [0.0_f64; 3];
    for (slot, part) in dms.iter_mut().zip(parts.iter()) {
        if part.denom == 0 {
            return None;
        }
        *slot = part.num as f64 / part.denom as f64;
    }
    let decimal = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;

    match ascii_first_byte(reference)?.to_ascii_uppercase() {
        r if r == positive => Some(decimal),
        r if r == negative => Some(-decimal),
        _ => None,
    }
}

fn ascii_first_byte(value: &Value) -> Option<u8> {
    match value {
        Value::Ascii(items) => items.first()?.first().copied(),
        _ => None,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Original capture time, then digitized, then file modified.
fn capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    let raw = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .find_map(|tag| exif.get_field(tag, In::PRIMARY))
        .and_then(|field| match &field.value {
            Value::Ascii(items) => items.first().map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })?;

    parse_exif_datetime(&raw)
}

fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('\0');
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT).ok()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::NaiveDate;
    use exif::Rational;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[test]
    fn decodes_northern_eastern_coordinates() {
        let file = write_temp(&jpeg_with_exif(8, 8, &moscow_gps()));
        let meta = extract(file.path());
        assert_eq!(meta.latitude, Some(55.7558));
        assert_eq!(meta.longitude, Some(37.6173));
        assert_eq!(meta.timestamp, None);
    }

    #[test]
    fn southern_and_western_references_are_negative() {
        let fields = vec![
            field(Tag::GPSLatitudeRef, ascii("S")),
            field(Tag::GPSLatitude, dms(33, 52, 0, 1)),
            field(Tag::GPSLongitudeRef, ascii("W")),
            field(Tag::GPSLongitude, dms(70, 40, 0, 1)),
        ];
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert!(meta.latitude.unwrap() < 0.0);
        assert!(meta.longitude.unwrap() < 0.0);
        assert_eq!(meta.latitude, Some(-33.866667));
    }

    #[test]
    fn image_without_gps_has_no_coordinates() {
        let fields = vec![field(Tag::DateTimeOriginal, ascii("2023:07:14 18:05:09"))];
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert_eq!((meta.latitude, meta.longitude), (None, None));
        assert_eq!(
            meta.timestamp,
            NaiveDate::from_ymd_opt(2023, 7, 14).unwrap().and_hms_opt(18, 5, 9)
        );
    }

    #[test]
    fn zero_denominator_drops_both_coordinates() {
        let mut fields = moscow_gps();
        fields[1] = field(
            Tag::GPSLatitude,
            Value::Rational(vec![
                Rational { num: 55, denom: 0 },
                Rational { num: 45, denom: 1 },
                Rational { num: 0, denom: 1 },
            ]),
        );
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert_eq!((meta.latitude, meta.longitude), (None, None));
    }

    #[test]
    fn missing_reference_tag_drops_both_coordinates() {
        let fields: Vec<_> = moscow_gps()
            .into_iter()
            .filter(|f| f.tag != Tag::GPSLongitudeRef)
            .collect();
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert_eq!((meta.latitude, meta.longitude), (None, None));
    }

    #[test]
    fn falls_back_to_digitized_then_modified_time() {
        let fields = vec![
            field(Tag::DateTime, ascii("2020:01:01 00:00:00")),
            field(Tag::DateTimeDigitized, ascii("2021:02:03 04:05:06")),
        ];
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert_eq!(
            meta.timestamp,
            NaiveDate::from_ymd_opt(2021, 2, 3).unwrap().and_hms_opt(4, 5, 6)
        );
    }

    #[test]
    fn unparsable_timestamp_is_none() {
        let fields = vec![field(Tag::DateTimeOriginal, ascii("yesterday"))];
        let meta = extract(write_temp(&jpeg_with_exif(8, 8, &fields)).path());
        assert_eq!(meta.timestamp, None);
    }

    #[test]
    fn plain_image_and_missing_file_yield_empty_record() {
        assert_eq!(extract(write_temp(&plain_jpeg(4, 4)).path()), PhotoMetadata::default());
        assert_eq!(extract(Path::new("/definitely/not/here.jpg")), PhotoMetadata::default());
    }
}
