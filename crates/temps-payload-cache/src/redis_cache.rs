//! Payload cache backed by a shared Redis instance

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::debug;

use crate::{Attachment, CacheError, PayloadCache};

/// Payload cache storing JSON documents in Redis with `SET ... EX`
#[derive(Clone)]
pub struct RedisPayloadCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisPayloadCache {
    /// Connect to Redis and build the cache
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

        Ok(Self::new(conn, key_prefix))
    }

    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn payload_key(&self, key: &str) -> String {
        payload_key(&self.key_prefix, key)
    }

    fn attachments_key(&self, key: &str) -> String {
        attachments_key(&self.key_prefix, key)
    }

    async fn set_with_expiry(
        &self,
        redis_key: &str,
        serialized: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        // EX granularity is seconds; never let a sub-second ttl become "no expiry"
        let seconds = ttl.as_secs().max(1);

        let mut cmd = redis::cmd("SET");
        cmd.arg(redis_key).arg(&serialized).arg("EX").arg(seconds);

        let _: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_raw(&self, redis_key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let result: Option<String> = conn.get(redis_key).await?;
        Ok(result)
    }
}

fn payload_key(prefix: &str, key: &str) -> String {
    format!("{}:c:{}", prefix, key)
}

fn attachments_key(prefix: &str, key: &str) -> String {
    format!("{}:a:{}", prefix, key)
}

#[async_trait]
impl PayloadCache for RedisPayloadCache {
    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let redis_key = self.payload_key(key);
        let serialized = serde_json::to_string(value)?;

        debug!("CACHE SET {} ({} bytes)", redis_key, serialized.len());
        self.set_with_expiry(&redis_key, serialized, ttl).await
    }

    async fn put_attachments(
        &self,
        key: &str,
        attachments: &[Attachment],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let redis_key = self.attachments_key(key);
        let serialized = serde_json::to_string(attachments)?;

        debug!(
            "CACHE SET {} ({} attachments, {} bytes)",
            redis_key,
            attachments.len(),
            serialized.len()
        );
        self.set_with_expiry(&redis_key, serialized, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        match self.get_raw(&self.payload_key(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn get_attachments(&self, key: &str) -> Result<Option<Vec<Attachment>>, CacheError> {
        match self.get_raw(&self.attachments_key(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
