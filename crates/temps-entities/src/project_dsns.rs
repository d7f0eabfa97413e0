use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use temps_core::types::DBDateTime;

/// Client key (DSN) provisioned for a project.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "project_dsns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i32,
    pub environment_id: Option<i32>,
    pub deployment_id: Option<i32>,
    pub name: String,
    #[sea_orm(unique)]
    pub public_key: String,
    /// Empty for keys issued without a secret
    pub secret_key: String,
    pub is_active: bool,
    /// Capability flag gating event submission with this key
    pub store_access: bool,
    pub rate_limit_per_minute: Option<i32>,
    /// JSON array of allowed origin patterns, e.g. `["*.example.com"]`
    pub allowed_origins: Option<Json>,
    pub last_used_at: Option<DBDateTime>,
    pub event_count: i64,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Model {
    /// Allowed origin patterns; a missing or malformed column yields an empty list.
    pub fn allowed_origin_patterns(&self) -> Vec<String> {
        self.allowed_origins
            .as_ref()
            .and_then(|value| value.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();

        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            self.updated_at = Set(now);
        }

        Ok(self)
    }
}
