//! Extraction of client credentials from inbound requests.
//!
//! An [`AuthExtractor`] turns transport level fields into an [`AuthClaim`].
//! Only the Sentry wire scheme exists today; others plug in behind the same
//! trait and are selected through [`crate::config::AuthScheme`].

pub mod header;
pub mod sentry;

use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::IngestError;

pub use sentry::SentryAuthExtractor;

/// Credential material presented by a client, parsed once per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthClaim {
    /// Free-form SDK identifier, defaulting to the User-Agent
    pub client: Option<String>,
    pub protocol_version: Option<String>,
    pub public_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Origin or Referer the request was sent from
    pub origin: Option<String>,
    /// Browser-style cross-origin delivery
    pub is_public: bool,
}

/// The transport fields an extractor may look at
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub client_ip: Option<IpAddr>,
}

impl RequestParts {
    pub fn new(headers: HeaderMap, query: Vec<(String, String)>) -> Self {
        Self {
            headers,
            query,
            client_ip: None,
        }
    }

    /// Build from a raw, still percent-encoded query string
    pub fn from_query_string(headers: HeaderMap, query: Option<&str>) -> Self {
        let query = query
            .map(|qs| url::form_urlencoded::parse(qs.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self::new(headers, query)
    }

    pub fn with_client_ip(mut self, client_ip: Option<IpAddr>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// Text of the first header named `name`
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).map(header::header_text)
    }
}

/// Wire scheme specific credential extraction
pub trait AuthExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parse the credential claim carried by the request
    fn extract_auth(&self, request: &RequestParts) -> Result<AuthClaim, IngestError>;

    /// Origin the request claims to come from, if any
    fn extract_origin(&self, request: &RequestParts) -> Option<String>;
}
