//! Repository implementations for database operations.

pub mod audit_log;
pub mod feature_toggle;
pub mod resource;
pub mod user;

pub use audit_log::AuditLogRepository;
pub use feature_toggle::FeatureToggleRepository;
pub use resource::ResourceRepository;
pub use user::UserRepository;
