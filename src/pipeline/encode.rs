//! Image encoding: page bitmaps → JPEG bytes, and the data-URL form used by
//! image blocks.
//!
//! Page captures are kept as JPEG at quality 100 by default. Near-lossless
//! is what the final document reproduces; the OCR path re-encodes from the
//! in-memory bitmap, not from these bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// MIME type of every page capture.
pub const JPEG_MIME: &str = "image/jpeg";

/// Encode a page bitmap as JPEG. Alpha is dropped; JPEG has no alpha channel.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    debug!(
        "Encoded {}x{} page → {} bytes JPEG (q{})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );
    Ok(buf)
}

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode an image payload back to raw bytes.
///
/// Accepts a full data URL or a bare base64 string.
pub fn decode_data_url(payload: &str) -> Result<Vec<u8>, String> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| "data URL has no ',' separator".to_string())?;
            if !header.ends_with(";base64") {
                return Err(format!("unsupported data URL encoding '{header}'"));
            }
            data
        }
        None => payload,
    };
    if encoded.is_empty() {
        return Err("empty image payload".to_string());
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid base64: {e}"))
}

/// Serde adapter storing `Vec<u8>` as a base64 string.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
