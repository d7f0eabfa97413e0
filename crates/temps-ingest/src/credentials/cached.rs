use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{CredentialStore, CredentialStoreError, ProjectCredential};
use temps_core::mask_sensitive;

pub const DEFAULT_CREDENTIAL_CACHE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_CREDENTIAL_CACHE_TTL_SECS
}

impl Default for CredentialCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

struct CachedCredential {
    credential: ProjectCredential,
    expires_at: Instant,
}

/// Read-through cache in front of another [`CredentialStore`].
///
/// Only hits are cached. Unknown keys always reach the inner store, so a
/// newly provisioned key is usable immediately.
pub struct CachedCredentialStore {
    inner: Arc<dyn CredentialStore>,
    entries: RwLock<HashMap<String, CachedCredential>>,
    ttl: Duration,
}

impl CachedCredentialStore {
    pub fn new(inner: Arc<dyn CredentialStore>, config: CredentialCacheConfig) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    /// Drop the cached snapshot for `public_key`, e.g. after the key is disabled
    pub async fn invalidate(&self, public_key: &str) {
        self.entries.write().await.remove(public_key);
    }

    async fn cached(&self, public_key: &str) -> Option<ProjectCredential> {
        let entries = self.entries.read().await;
        entries
            .get(public_key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.credential.clone())
    }
}

#[async_trait]
impl CredentialStore for CachedCredentialStore {
    async fn get_credential(
        &self,
        public_key: &str,
    ) -> Result<Option<ProjectCredential>, CredentialStoreError> {
        if let Some(credential) = self.cached(public_key).await {
            return Ok(Some(credential));
        }

        debug!(
            "Credential cache miss for {}, querying store",
            mask_sensitive(public_key)
        );
        let credential = self.inner.get_credential(public_key).await?;

        let mut entries = self.entries.write().await;
        match &credential {
            Some(found) => {
                entries.insert(
                    public_key.to_string(),
                    CachedCredential {
                        credential: found.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            None => {
                entries.remove(public_key);
            }
        }

        Ok(credential)
    }
}
