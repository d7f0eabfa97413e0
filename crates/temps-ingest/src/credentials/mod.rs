//! Project credentials and the stores they are looked up in

pub mod cached;
pub mod database;
pub mod origin;
pub mod resolver;
pub mod static_store;

use async_trait::async_trait;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use temps_entities::project_dsns;
use thiserror::Error;

pub use cached::{CachedCredentialStore, CredentialCacheConfig};
pub use database::DatabaseCredentialStore;
pub use resolver::{looks_like_api_key, CredentialResolver};
pub use static_store::StaticCredentialStore;

use crate::context::ProjectScope;

/// Point-in-time snapshot of a provisioned client key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCredential {
    pub public_key: String,
    /// Empty when the key was issued without a secret
    #[serde(default)]
    pub secret_key: String,
    pub project_id: i32,
    #[serde(default)]
    pub environment_id: Option<i32>,
    #[serde(default)]
    pub deployment_id: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub allows_store_access: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ProjectCredential {
    pub fn new(public_key: impl Into<String>, project_id: i32) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: String::new(),
            project_id,
            environment_id: None,
            deployment_id: None,
            is_active: true,
            allows_store_access: true,
            allowed_origins: Vec::new(),
        }
    }

    pub fn scope(&self) -> ProjectScope {
        ProjectScope {
            project_id: self.project_id,
            environment_id: self.environment_id,
            deployment_id: self.deployment_id,
        }
    }
}

impl From<project_dsns::Model> for ProjectCredential {
    fn from(model: project_dsns::Model) -> Self {
        let allowed_origins = model.allowed_origin_patterns();
        Self {
            public_key: model.public_key,
            secret_key: model.secret_key,
            project_id: model.project_id,
            environment_id: model.environment_id,
            deployment_id: model.deployment_id,
            is_active: model.is_active,
            allows_store_access: model.store_access,
            allowed_origins,
        }
    }
}

#[derive(Error, Debug)]
pub enum CredentialStoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Failed to read credentials: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse credentials: {0}")]
    Parse(String),
}

/// Durable source of project credentials, keyed by public key
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no credential exists for `public_key`
    async fn get_credential(
        &self,
        public_key: &str,
    ) -> Result<Option<ProjectCredential>, CredentialStoreError>;
}
