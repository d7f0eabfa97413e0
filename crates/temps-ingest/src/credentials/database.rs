use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use temps_entities::project_dsns;

use super::{CredentialStore, CredentialStoreError, ProjectCredential};

/// Credential lookups against the `project_dsns` table
pub struct DatabaseCredentialStore {
    db: Arc<DatabaseConnection>,
}

impl DatabaseCredentialStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for DatabaseCredentialStore {
    async fn get_credential(
        &self,
        public_key: &str,
    ) -> Result<Option<ProjectCredential>, CredentialStoreError> {
        let dsn = project_dsns::Entity::find()
            .filter(project_dsns::Column::PublicKey.eq(public_key))
            .one(self.db.as_ref())
            .await?;

        Ok(dsn.map(ProjectCredential::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
    use serde_json::json;

    fn dsn_model() -> project_dsns::Model {
        project_dsns::Model {
            id: 1,
            project_id: 42,
            environment_id: Some(3),
            deployment_id: None,
            name: "Default DSN".to_string(),
            public_key: "abc123".to_string(),
            secret_key: String::new(),
            is_active: true,
            store_access: true,
            rate_limit_per_minute: Some(1000),
            allowed_origins: Some(json!(["*.example.com"])),
            last_used_at: None,
            event_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_credential_maps_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![dsn_model()]])
            .into_connection();
        let store = DatabaseCredentialStore::new(Arc::new(db));

        let credential = store.get_credential("abc123").await.unwrap().unwrap();
        assert_eq!(credential.project_id, 42);
        assert_eq!(credential.environment_id, Some(3));
        assert!(credential.allows_store_access);
        assert_eq!(credential.allowed_origins, vec!["*.example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_get_credential_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<project_dsns::Model>::new()])
            .into_connection();
        let store = DatabaseCredentialStore::new(Arc::new(db));

        assert!(store.get_credential("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_credential_database_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let store = DatabaseCredentialStore::new(Arc::new(db));

        let result = store.get_credential("abc123").await;
        assert!(matches!(result, Err(CredentialStoreError::Database(_))));
    }
}
