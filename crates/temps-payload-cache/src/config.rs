//! Payload cache configuration types

use serde::{Deserialize, Serialize};

/// Payloads and attachments expire one hour after admission
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
/// Default Redis key namespace
pub const DEFAULT_KEY_PREFIX: &str = "temps:ingest";

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// Which store backs the payload cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Process-local map, for single-node deployments and tests
    Memory,
    /// Shared Redis instance
    Redis { url: String },
}

/// Where the payload cache lives. Entry expiry is chosen by the caller on
/// every write, see `GatewayConfig::cache_ttl_secs` in the ingest crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadCacheConfig {
    /// Redis connection URL; the in-memory backend is used when absent
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace prepended to every Redis key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for PayloadCacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl PayloadCacheConfig {
    pub fn backend(&self) -> CacheBackend {
        match &self.redis_url {
            Some(url) if !url.trim().is_empty() => CacheBackend::Redis { url: url.clone() },
            _ => CacheBackend::Memory,
        }
    }
}
