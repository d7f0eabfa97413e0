use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{CredentialStore, CredentialStoreError, ProjectCredential};

/// Fixed set of credentials held in memory, typically loaded from YAML
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: HashMap<String, ProjectCredential>,
}

impl StaticCredentialStore {
    pub fn new(credentials: impl IntoIterator<Item = ProjectCredential>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|credential| (credential.public_key.clone(), credential))
                .collect(),
        }
    }

    /// Parse a YAML list of credential records
    pub fn from_yaml(source: &str) -> Result<Self, CredentialStoreError> {
        let credentials: Vec<ProjectCredential> = serde_yaml::from_str(source)
            .map_err(|e| CredentialStoreError::Parse(e.to_string()))?;
        Ok(Self::new(credentials))
    }

    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CredentialStoreError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await?;
        let store = Self::from_yaml(&source)?;
        info!("Loaded {} credentials from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credential(
        &self,
        public_key: &str,
    ) -> Result<Option<ProjectCredential>, CredentialStoreError> {
        Ok(self.credentials.get(public_key).cloned())
    }
}
