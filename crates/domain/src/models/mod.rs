//! Domain models for the feature toggle manager.

pub mod audit_log;
pub mod resource;
pub mod toggle;
pub mod user;

pub use audit_log::{
    AuditAction, AuditExportRecord, AuditLogEntry, AuditLogFilter, AuditLogQueryParams,
    DateRange, ExportAuditLogsRequest, ExportFormat, ListAuditLogsResponse, NewAuditLogEntry,
};
pub use resource::{
    AppConfigResource, ConnectionStatus, CreateResourceRequest, DeleteResourceResponse,
    DiscoveredResource, EnvironmentType, ResourceResponse, SubscriptionInfo,
    TestConnectionRequest, TestConnectionResponse, UpdateResourceRequest,
};
pub use toggle::{
    FeatureFlag, FeatureToggle, FlagValueError, KeyValue, ToggleListResponse,
    UpdateToggleRequest,
};
pub use user::{SignInIdentity, UpdateUserRoleRequest, User, UserRole};
