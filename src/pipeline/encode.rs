//! Image encoding and content addressing.
//!
//! Filenames are derived from the raw pixel buffer rather than the encoded
//! bytes: PNG and JPEG encoders are free to change their output between
//! versions, but the same rendering of the same page always has the same
//! pixels. Hashing the buffer keeps a stored path stable for a given image
//! no matter which format it was written in.

use crate::config::ImageFormat;
use crate::error::CrawlError;
use image::{DynamicImage, RgbaImage};
use md5::{Digest, Md5};
use std::io::Cursor;
use tracing::debug;

/// MD5 hex digest of the image's raw RGBA pixel bytes.
pub fn content_hash(img: &RgbaImage) -> String {
    format!("{:x}", Md5::digest(img.as_raw()))
}

/// Content-addressed filename: `<md5-of-pixels>.<ext>`.
pub fn content_path(img: &RgbaImage, format: ImageFormat) -> String {
    format!("{}.{}", content_hash(img), format.extension())
}

/// Encode `img` in memory in the requested format.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_image(img: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>, CrawlError> {
    let mut buf = Vec::new();
    let result = match format {
        ImageFormat::Png => img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png),
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(img.clone())
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg),
    };
    result.map_err(|e| CrawlError::ImageEncodeFailed {
        format: format.to_string(),
        detail: e.to_string(),
    })?;

    debug!("Encoded {}x{} image → {} bytes {}", img.width(), img.height(), buf.len(), format);
    Ok(buf)
}
