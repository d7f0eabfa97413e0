//! Parsing of scheme-prefixed credential headers.
//!
//! `X-Sentry-Auth: Sentry sentry_key=<public>, sentry_version=7, sentry_client=raven-js/3.0`

use std::collections::HashMap;

use axum::http::HeaderValue;

use crate::error::IngestError;

/// Decode raw header bytes as Latin-1. Legacy SDKs send non-UTF-8 agents.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Header text, falling back to Latin-1 when it is not visible ASCII
pub fn header_text(value: &HeaderValue) -> String {
    match value.to_str() {
        Ok(text) => text.to_string(),
        Err(_) => decode_latin1(value.as_bytes()),
    }
}

/// Whether `value` starts with `scheme` followed by a space, ignoring case
pub fn has_scheme(value: &str, scheme: &str) -> bool {
    let bytes = value.as_bytes();
    let n = scheme.len();
    bytes.len() > n && bytes[..n].eq_ignore_ascii_case(scheme.as_bytes()) && bytes[n] == b' '
}

/// Split a credential blob into its `key=value` fields.
///
/// The leading scheme token is dropped. Every non-empty comma separated part
/// must contain `=`; otherwise the whole header is rejected.
pub fn parse_auth_header(value: &str) -> Result<HashMap<String, String>, IngestError> {
    let (_, params) = value
        .split_once(' ')
        .ok_or_else(|| IngestError::malformed("Invalid authentication header"))?;

    let mut fields = HashMap::new();
    for part in params.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, val) = part
            .split_once('=')
            .ok_or_else(|| IngestError::malformed("Invalid authentication header"))?;
        fields.insert(key.to_string(), val.to_string());
    }

    if fields.is_empty() {
        return Err(IngestError::malformed("Invalid authentication header"));
    }

    Ok(fields)
}
