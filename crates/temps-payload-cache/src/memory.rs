//! Process-local payload cache

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::{Attachment, CacheError, PayloadCache};

/// Stored entries after which writes start sweeping expired ones
const SWEEP_THRESHOLD: usize = 1024;
/// Minimum time between two sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
struct Slots {
    payloads: HashMap<String, Entry>,
    attachments: HashMap<String, Entry>,
    /// Earliest instant the next sweep may run; `None` until the first one
    next_sweep: Option<Instant>,
}

impl Slots {
    /// Drop expired entries from both maps, at most once per `SWEEP_INTERVAL`
    fn maybe_sweep(&mut self, now: Instant) {
        if self.payloads.len() + self.attachments.len() < SWEEP_THRESHOLD {
            return;
        }
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }

        let before = self.payloads.len() + self.attachments.len();
        self.payloads.retain(|_, entry| entry.is_live(now));
        self.attachments.retain(|_, entry| entry.is_live(now));
        self.next_sweep = Some(now + SWEEP_INTERVAL);

        debug!(
            "Swept {} expired cache entries",
            before - self.payloads.len() - self.attachments.len()
        );
    }
}

/// Payload cache held in memory.
///
/// Values are stored serialized so the same encoding errors surface as with
/// the Redis backend. Expired entries are dropped on read; writes sweep the
/// rest once the cache is large, at most once per sweep interval.
#[derive(Default)]
pub struct InMemoryPayloadCache {
    slots: RwLock<Slots>,
}

impl InMemoryPayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live payload entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let slots = self.slots.read().await;
        slots.payloads.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn read(&self, key: &str, attachments: bool) -> Option<Vec<u8>> {
        let now = Instant::now();
        {
            let slots = self.slots.read().await;
            let map = if attachments {
                &slots.attachments
            } else {
                &slots.payloads
            };
            match map.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.bytes.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut slots = self.slots.write().await;
        let map = if attachments {
            &mut slots.attachments
        } else {
            &mut slots.payloads
        };
        if map.get(key).is_some_and(|entry| !entry.is_live(now)) {
            map.remove(key);
        }
        None
    }

    async fn write(&self, key: &str, bytes: Vec<u8>, ttl: Duration, attachments: bool) {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        slots.maybe_sweep(now);
        let map = if attachments {
            &mut slots.attachments
        } else {
            &mut slots.payloads
        };
        map.insert(
            key.to_string(),
            Entry {
                bytes,
                expires_at: now + ttl,
            },
        );
    }
}

#[async_trait]
impl PayloadCache for InMemoryPayloadCache {
    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        debug!("CACHE SET {} ({} bytes, ttl {:?})", key, bytes.len(), ttl);
        self.write(key, bytes, ttl, false).await;
        Ok(())
    }

    async fn put_attachments(
        &self,
        key: &str,
        attachments: &[Attachment],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(attachments)?;
        debug!(
            "CACHE SET attachments {} ({} items, ttl {:?})",
            key,
            attachments.len(),
            ttl
        );
        self.write(key, bytes, ttl, true).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        match self.read(key, false).await {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_attachments(&self, key: &str) -> Result<Option<Vec<Attachment>>, CacheError> {
        match self.read(key, true).await {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
