//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{User, UserRole};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            external_id: entity.external_id,
            name: entity.name,
            email: entity.email,
            // The column is CHECK-constrained; fall back to the least privilege.
            role: entity.role.parse().unwrap_or(UserRole::ReadOnly),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            last_seen_at: entity.last_seen_at,
        }
    }
}
