//! App Configuration resource entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{AppConfigResource, ConnectionStatus, EnvironmentType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the app_config_resources table.
#[derive(Clone, FromRow)]
pub struct ResourceEntity {
    pub id: Uuid,
    pub display_name: String,
    pub environment_type: String,
    pub resource_name: String,
    pub resource_group: String,
    pub connection_string: String,
    pub endpoint: Option<String>,
    pub subscription_id: String,
    pub connection_status: String,
    pub last_tested: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResourceEntity> for AppConfigResource {
    fn from(entity: ResourceEntity) -> Self {
        Self {
            id: entity.id,
            display_name: entity.display_name,
            environment_type: entity
                .environment_type
                .parse()
                .unwrap_or(EnvironmentType::Development),
            resource_name: entity.resource_name,
            resource_group: entity.resource_group,
            connection_string: entity.connection_string,
            endpoint: entity.endpoint,
            subscription_id: entity.subscription_id,
            connection_status: entity
                .connection_status
                .parse()
                .unwrap_or(ConnectionStatus::Unknown),
            last_tested: entity.last_tested,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
