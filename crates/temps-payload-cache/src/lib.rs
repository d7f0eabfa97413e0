//! temps-payload-cache: short-lived storage for admitted event payloads
//!
//! Raw events are parked here between admission and preprocessing. Keys are
//! computed by the caller from the event identity, so repeated deliveries of
//! one event overwrite the same slot. Attachments live in a parallel entry
//! under the same key.

pub mod attachment;
pub mod config;
pub mod error;
pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use attachment::Attachment;
pub use config::{CacheBackend, PayloadCacheConfig, DEFAULT_CACHE_TTL_SECS};
pub use error::CacheError;
pub use memory::InMemoryPayloadCache;
pub use redis_cache::RedisPayloadCache;

/// Expiry applied to payloads and attachments
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(DEFAULT_CACHE_TTL_SECS);

/// Time-bounded key/value store for event payloads.
///
/// Writes are idempotent overwrites; no locking is needed between racing
/// deliveries of the same event.
#[async_trait]
pub trait PayloadCache: Send + Sync {
    /// Store the canonical event body under `key`
    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Store the attachments belonging to the event under `key`
    async fn put_attachments(
        &self,
        key: &str,
        attachments: &[Attachment],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// `None` means the event was submitted without attachments
    async fn get_attachments(&self, key: &str) -> Result<Option<Vec<Attachment>>, CacheError>;
}
