//! Feature toggle entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::FeatureToggle;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the feature_toggles table.
#[derive(Debug, Clone, FromRow)]
pub struct FeatureToggleEntity {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub key: String,
    pub label: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeatureToggleEntity> for FeatureToggle {
    fn from(entity: FeatureToggleEntity) -> Self {
        Self {
            id: entity.id,
            resource_id: entity.resource_id,
            key: entity.key,
            label: entity.label,
            name: entity.name,
            description: entity.description,
            enabled: entity.enabled,
            last_modified_by: entity.last_modified_by,
            last_modified_at: entity.last_modified_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
