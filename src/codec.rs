//! Stateless decode/encode of raw image buffers.
//!
//! Content types are classified from magic bytes, never from metadata the
//! sender supplied. Exactly two raster formats are supported (JPEG, PNG);
//! an image is always re-encoded in the format it was decoded from.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// MIME type for JPEG payloads.
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";
/// MIME type for PNG payloads.
pub const CONTENT_TYPE_PNG: &str = "image/png";

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Classify a buffer's content type from its leading magic bytes.
///
/// Only JPEG and PNG are recognized as images. Printable-ASCII/UTF-8-looking
/// prefixes are reported as `text/plain` so that rejected uploads carry a
/// useful diagnostic; everything else falls back to
/// `application/octet-stream`.
pub fn sniff_content_type(buf: &[u8]) -> &'static str {
    if buf.starts_with(JPEG_MAGIC) {
        return CONTENT_TYPE_JPEG;
    }
    if buf.starts_with(PNG_MAGIC) {
        return CONTENT_TYPE_PNG;
    }
    let probe = &buf[..buf.len().min(512)];
    if !probe.is_empty()
        && probe
            .iter()
            .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..0x7F).contains(&b))
    {
        return "text/plain; charset=utf-8";
    }
    "application/octet-stream"
}

/// Map a supported content type to the [`ImageFormat`] used to (de)code it.
fn format_for(content_type: &str) -> Option<ImageFormat> {
    match content_type {
        CONTENT_TYPE_JPEG | "image/jpg" => Some(ImageFormat::Jpeg),
        CONTENT_TYPE_PNG => Some(ImageFormat::Png),
        _ => None,
    }
}

/// File extension used when persisting a buffer of the given content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        CONTENT_TYPE_JPEG | "image/jpg" => Some("jpeg"),
        CONTENT_TYPE_PNG => Some("png"),
        _ => None,
    }
}

/// Whether the given content type is one of the two accepted raster formats.
pub fn is_supported(content_type: &str) -> bool {
    format_for(content_type).is_some()
}

/// Decode a raw buffer into an image, returning the detected content type
/// alongside it.
///
/// The buffer is decoded strictly as the format its magic bytes claim; a
/// buffer of any other type fails with [`Error::UnsupportedFormat`] carrying
/// the detected type string.
pub fn decode(buf: &[u8]) -> Result<(DynamicImage, &'static str)> {
    let content_type = sniff_content_type(buf);
    let format = format_for(content_type).ok_or_else(|| Error::unsupported(content_type))?;

    let img = image::load_from_memory_with_format(buf, format).map_err(|source| Error::Decode {
        content_type: content_type.to_string(),
        source,
    })?;

    Ok((img, content_type))
}

/// Re-serialize an image using the same format it was decoded as.
///
/// No cross-format conversion: `content_type` must be one of the supported
/// raster types.
pub fn encode(img: &DynamicImage, content_type: &str) -> Result<Vec<u8>> {
    let format = format_for(content_type).ok_or_else(|| Error::unsupported(content_type))?;

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).map_err(|source| Error::Encode {
        content_type: content_type.to_string(),
        source,
    })?;

    Ok(buf.into_inner())
}
