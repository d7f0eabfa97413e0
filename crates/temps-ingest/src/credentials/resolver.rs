use std::sync::Arc;

use subtle::ConstantTimeEq;
use temps_core::mask_sensitive;
use tracing::{debug, error};

use super::{CredentialStore, ProjectCredential};
use crate::auth::AuthClaim;
use crate::error::IngestError;

const MAX_PUBLIC_KEY_LEN: usize = 64;

/// Cheap structural check run before any store lookup
pub fn looks_like_api_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_PUBLIC_KEY_LEN
        && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Validates an [`AuthClaim`] against the stored credential.
///
/// Every failed check is reported as the same [`IngestError::Unauthenticated`];
/// the specific reason is logged at debug level only.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, claim: &AuthClaim) -> Result<ProjectCredential, IngestError> {
        let public_key = claim
            .public_key
            .as_deref()
            .ok_or_else(|| reject(None, "Client did not send a public key"))?;

        if !looks_like_api_key(public_key) {
            return Err(reject(Some(public_key), "Public key is malformed"));
        }

        let credential = self
            .store
            .get_credential(public_key)
            .await
            .map_err(|e| {
                error!(
                    "Credential lookup for {} failed: {}",
                    mask_sensitive(public_key),
                    e
                );
                IngestError::from(e)
            })?
            .ok_or_else(|| reject(Some(public_key), "Public key does not exist"))?;

        // A claim without a secret compares the stored secret with itself
        let presented = claim
            .secret_key
            .as_deref()
            .unwrap_or(credential.secret_key.as_str());
        let matches: bool = credential
            .secret_key
            .as_bytes()
            .ct_eq(presented.as_bytes())
            .into();
        if !matches {
            return Err(reject(Some(public_key), "Secret key does not match"));
        }

        if !credential.is_active {
            return Err(reject(Some(public_key), "Key is disabled"));
        }

        if !credential.allows_store_access {
            return Err(reject(Some(public_key), "Key does not allow event submission"));
        }

        Ok(credential)
    }

    pub async fn resolve_project_id(&self, claim: &AuthClaim) -> Result<i32, IngestError> {
        self.resolve(claim).await.map(|credential| credential.project_id)
    }
}

fn reject(public_key: Option<&str>, reason: &'static str) -> IngestError {
    debug!(
        public_key = %public_key.map(mask_sensitive).unwrap_or_default(),
        "Rejecting credential: {}",
        reason
    );
    IngestError::unauthenticated(reason)
}
