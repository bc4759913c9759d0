//! Audit log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{AuditAction, AuditLogEntry, EnvironmentType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the audit_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntity {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub user_email: String,
    pub action: String,
    pub toggle_id: Option<Uuid>,
    pub toggle_name: String,
    pub resource_id: Option<Uuid>,
    pub resource_name: String,
    pub environment_type: String,
    pub previous_state: bool,
    pub new_state: bool,
}

impl From<AuditLogEntity> for AuditLogEntry {
    fn from(entity: AuditLogEntity) -> Self {
        Self {
            id: entity.id,
            timestamp: entity.timestamp,
            user_id: entity.user_id,
            user_name: entity.user_name,
            user_email: entity.user_email,
            action: entity
                .action
                .parse()
                .unwrap_or_else(|_| AuditAction::for_new_state(entity.new_state)),
            toggle_id: entity.toggle_id,
            toggle_name: entity.toggle_name,
            resource_id: entity.resource_id,
            resource_name: entity.resource_name,
            environment_type: entity
                .environment_type
                .parse()
                .unwrap_or(EnvironmentType::Development),
            previous_state: entity.previous_state,
            new_state: entity.new_state,
        }
    }
}
