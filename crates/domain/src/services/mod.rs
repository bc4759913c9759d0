//! Domain services for the feature toggle manager.
//!
//! Services contain business logic that operates on domain models.

pub mod audit;
pub mod authorization;
pub mod feature_flags;

pub use audit::AuditLogBuilder;
pub use authorization::{
    authorize_resource_management, authorize_role_change, authorize_toggle_mutation,
    authorize_user_management, PermissionError,
};
pub use feature_flags::{FeatureFlagStore, FlagStoreError, InMemoryFeatureFlagStore};
