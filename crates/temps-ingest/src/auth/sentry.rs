use std::collections::HashMap;

use tracing::debug;

use super::header::{has_scheme, parse_auth_header};
use super::{AuthClaim, AuthExtractor, RequestParts};
use crate::error::IngestError;

/// Reserved namespace for credentials passed as query parameters
pub const QUERY_PREFIX: &str = "sentry_";
/// Scheme token of the credential headers
pub const AUTH_SCHEME: &str = "sentry";
pub const PRIMARY_AUTH_HEADER: &str = "x-sentry-auth";
/// Checked only when the primary header carries no Sentry credentials
pub const LEGACY_AUTH_HEADER: &str = "authorization";

/// Extractor for the Sentry SDK wire format
#[derive(Debug, Default, Clone, Copy)]
pub struct SentryAuthExtractor;

impl SentryAuthExtractor {
    pub fn new() -> Self {
        Self
    }

    fn query_fields(request: &RequestParts) -> HashMap<String, String> {
        request
            .query
            .iter()
            .filter(|(key, _)| key.starts_with(QUERY_PREFIX))
            .cloned()
            .collect()
    }

    fn credential_header(request: &RequestParts) -> Option<String> {
        [PRIMARY_AUTH_HEADER, LEGACY_AUTH_HEADER]
            .iter()
            .filter_map(|name| request.header(name))
            .find(|value| has_scheme(value, AUTH_SCHEME))
    }
}

impl AuthExtractor for SentryAuthExtractor {
    fn name(&self) -> &'static str {
        "sentry"
    }

    fn extract_auth(&self, request: &RequestParts) -> Result<AuthClaim, IngestError> {
        let mut fields = Self::query_fields(request);

        if let Some(header) = Self::credential_header(request) {
            // Two independent channels are a conflict, never merged
            if !fields.is_empty() {
                return Err(IngestError::malformed(
                    "Multiple authentication payloads were detected.",
                ));
            }
            fields = parse_auth_header(&header)?;
        }

        if fields.is_empty() {
            return Err(IngestError::unauthenticated(
                "Unable to find authentication information",
            ));
        }

        let origin = self.extract_origin(request);
        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();

        let client = non_empty("sentry_client").or_else(|| request.header("user-agent"));

        let claim = AuthClaim {
            client,
            protocol_version: fields.get("sentry_version").cloned(),
            public_key: non_empty("sentry_key"),
            secret_key: non_empty("sentry_secret"),
            is_public: origin.is_some(),
            origin,
        };

        debug!(
            client = ?claim.client,
            version = ?claim.protocol_version,
            is_public = claim.is_public,
            "Extracted sentry auth claim"
        );

        Ok(claim)
    }

    fn extract_origin(&self, request: &RequestParts) -> Option<String> {
        let origin = request.header("origin");

        // Native and mobile apps send a literal "null" origin
        if origin.as_deref() == Some("null") {
            return Some("null".to_string());
        }

        origin
            .filter(|value| !value.is_empty())
            .or_else(|| request.header("referer").filter(|value| !value.is_empty()))
    }
}
