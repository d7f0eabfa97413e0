use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use temps_payload_cache::DEFAULT_CACHE_TTL_SECS;

use crate::auth::{AuthExtractor, SentryAuthExtractor};

/// Default limit for a single event body, before and after decompression
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024 * 1024;

/// Wire scheme used to extract client credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Sentry,
}

impl AuthScheme {
    pub fn extractor(&self) -> Arc<dyn AuthExtractor> {
        match self {
            AuthScheme::Sentry => Arc::new(SentryAuthExtractor::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub auth_scheme: AuthScheme,
    #[serde(default = "default_max_event_size")]
    pub max_event_size: usize,
    /// Expiry of cached payloads and attachments
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Reject public submissions from origins the key does not list
    #[serde(default = "default_enforce_origins")]
    pub enforce_origins: bool,
}

fn default_max_event_size() -> usize {
    DEFAULT_MAX_EVENT_SIZE
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_enforce_origins() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_scheme: AuthScheme::default(),
            max_event_size: default_max_event_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            enforce_origins: default_enforce_origins(),
        }
    }
}

impl GatewayConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: GatewayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.auth_scheme, AuthScheme::Sentry);
        assert_eq!(config.max_event_size, 1024 * 1024);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert!(config.enforce_origins);
        assert_eq!(config.auth_scheme.extractor().name(), "sentry");
    }

    #[test]
    fn test_overrides() {
        let config: GatewayConfig =
            serde_yaml::from_str("auth_scheme: sentry\nmax_event_size: 10\nenforce_origins: false")
                .unwrap();
        assert_eq!(config.max_event_size, 10);
        assert!(!config.enforce_origins);
    }

    #[test]
    fn test_cache_ttl_override() {
        let config: GatewayConfig = serde_yaml::from_str("cache_ttl_secs: 60").unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.max_event_size, DEFAULT_MAX_EVENT_SIZE);
    }
}
