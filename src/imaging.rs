use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::filename::thumbnail_name;

const PREVIEW_BOUND: u32 = 400;
const PREVIEW_QUALITY: u8 = 90;
const THUMBNAIL_BOUND: u32 = 300;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unreadable image: {0}")]
    Unreadable(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Downsize into a `bound`x`bound` box, keeping the aspect ratio. Never upscales.
fn fit_within(img: DynamicImage, bound: u32) -> DynamicImage {
    if img.width() > bound || img.height() > bound {
        img.resize(bound, bound, FilterType::Lanczos3)
    } else {
        img
    }
}

/// A small JPEG of the upload inlined as a `data:` URI.
pub fn make_preview(data: &[u8]) -> Result<String, ImageError> {
    let img = image::load_from_memory(data).map_err(ImageError::Unreadable)?;
    let img = DynamicImage::ImageRgb8(fit_within(img, PREVIEW_BOUND).to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, PREVIEW_QUALITY))
        .map_err(ImageError::Encode)?;

    let b64 = general_purpose::STANDARD.encode(buf.into_inner());
    Ok(format!("data:image/jpeg;base64,{}", b64))
}

/// Writes `<stem>_tmb<ext>` next to `path` and returns its path.
///
/// The thumbnail is re-encoded from pixels only, so none of the original's
/// EXIF (GPS included) ends up in it.
pub fn thumbnail(path: &Path) -> Result<PathBuf, ImageError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(ImageError::Unreadable)?;
    let format = ImageFormat::from_path(path).map_err(ImageError::Unreadable)?;
    let thumb = fit_within(img, THUMBNAIL_BOUND);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let thumb_path = path.with_file_name(thumbnail_name(&name));

    let mut out = BufWriter::new(File::create(&thumb_path)?);
    let written = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(thumb.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 100)),
        ImageFormat::Png => thumb.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        other => DynamicImage::ImageRgba8(thumb.to_rgba8()).write_to(&mut out, other),
    };
    if let Err(e) = written {
        drop(out);
        let _ = std::fs::remove_file(&thumb_path);
        return Err(ImageError::Encode(e));
    }
    out.flush()?;

    Ok(thumb_path)
}

/// `make_preview` on the blocking pool.
pub async fn preview_async(data: Bytes) -> Result<String, ImageError> {
    tokio::task::spawn_blocking(move || make_preview(&data)).await?
}

/// `thumbnail` on the blocking pool.
pub async fn thumbnail_async(path: PathBuf) -> Result<PathBuf, ImageError> {
    tokio::task::spawn_blocking(move || thumbnail(&path)).await?
}
