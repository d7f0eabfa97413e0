//! Request body decoding.
//!
//! SDKs send events as plain JSON, gzip/deflate with a `Content-Encoding`
//! header, or (older clients) as base64 of zlib-compressed JSON. Every stage
//! is bounded so a small compressed body cannot expand without limit.

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use serde_json::Value;
use tracing::debug;

use crate::error::IngestError;

/// Decode a raw request body into JSON bytes no larger than `max_size`
pub fn decode_body(
    body: &[u8],
    content_encoding: Option<&str>,
    max_size: usize,
) -> Result<Vec<u8>, IngestError> {
    if body.len() > max_size {
        return Err(IngestError::PayloadTooLarge { limit: max_size });
    }

    let encoding = content_encoding
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let decoded = match encoding.as_str() {
        "gzip" | "x-gzip" => read_bounded(GzDecoder::new(body), max_size, "gzip")?,
        "deflate" => read_bounded(ZlibDecoder::new(body), max_size, "deflate")?,
        "" | "identity" => body.to_vec(),
        other => {
            return Err(IngestError::malformed(format!(
                "Unsupported content encoding: {}",
                other
            )))
        }
    };

    if starts_with_json_object(&decoded) {
        return Ok(decoded);
    }

    // Legacy clients: base64, usually wrapping zlib
    let compact: Vec<u8> = decoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let unwrapped = STANDARD
        .decode(&compact)
        .map_err(|_| IngestError::malformed("Bad data decoding request"))?;
    debug!("Decoded {} byte base64 event body", unwrapped.len());

    if starts_with_json_object(&unwrapped) {
        return Ok(unwrapped);
    }

    read_bounded(ZlibDecoder::new(unwrapped.as_slice()), max_size, "zlib")
}

/// Parse decoded bytes as a JSON event
pub fn parse_event_body(bytes: &[u8]) -> Result<Value, IngestError> {
    serde_json::from_slice(bytes)
        .map_err(|e| IngestError::malformed(format!("Bad data reconstructing object: {}", e)))
}

fn starts_with_json_object(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

fn read_bounded<R: Read>(reader: R, max_size: usize, stage: &str) -> Result<Vec<u8>, IngestError> {
    let mut decoded = Vec::new();
    reader
        .take(max_size as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| IngestError::malformed(format!("Failed to decompress {} data: {}", stage, e)))?;

    if decoded.len() > max_size {
        return Err(IngestError::PayloadTooLarge { limit: max_size });
    }

    Ok(decoded)
}
