//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod audit_log;
pub mod feature_toggle;
pub mod resource;
pub mod user;

pub use audit_log::AuditLogEntity;
pub use feature_toggle::FeatureToggleEntity;
pub use resource::ResourceEntity;
pub use user::UserEntity;
