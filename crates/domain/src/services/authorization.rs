//! Role checks for mutating operations.
//!
//! Reads are open to every signed-in user. Writes are gated here so that
//! handlers can reject a request before any remote call is made.

use thiserror::Error;
use uuid::Uuid;

use crate::models::UserRole;

/// Why an action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Admin access required to modify toggles")]
    ToggleMutation,

    #[error("Admin access required to manage resources")]
    ResourceManagement,

    #[error("Admin access required to manage users")]
    UserManagement,

    #[error("You cannot change your own role")]
    SelfRoleChange,
}

/// Only admins may flip a toggle.
pub fn authorize_toggle_mutation(role: UserRole) -> Result<(), PermissionError> {
    match role {
        UserRole::Admin => Ok(()),
        UserRole::ReadOnly => Err(PermissionError::ToggleMutation),
    }
}

/// Creating, updating or deleting resources. When `admin_only` is false any
/// signed-in user may manage resources.
pub fn authorize_resource_management(
    role: UserRole,
    admin_only: bool,
) -> Result<(), PermissionError> {
    if !admin_only || role == UserRole::Admin {
        Ok(())
    } else {
        Err(PermissionError::ResourceManagement)
    }
}

pub fn authorize_user_management(role: UserRole) -> Result<(), PermissionError> {
    match role {
        UserRole::Admin => Ok(()),
        UserRole::ReadOnly => Err(PermissionError::UserManagement),
    }
}

/// An admin may change anyone's role except their own.
pub fn authorize_role_change(
    actor_role: UserRole,
    actor_id: Uuid,
    target_id: Uuid,
) -> Result<(), PermissionError> {
    authorize_user_management(actor_role)?;
    if actor_id == target_id {
        return Err(PermissionError::SelfRoleChange);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_mutation_requires_admin() {
        assert!(authorize_toggle_mutation(UserRole::Admin).is_ok());
        assert_eq!(
            authorize_toggle_mutation(UserRole::ReadOnly),
            Err(PermissionError::ToggleMutation)
        );
    }

    #[test]
    fn test_resource_management_respects_admin_only_flag() {
        assert!(authorize_resource_management(UserRole::Admin, true).is_ok());
        assert!(authorize_resource_management(UserRole::ReadOnly, false).is_ok());
        assert_eq!(
            authorize_resource_management(UserRole::ReadOnly, true),
            Err(PermissionError::ResourceManagement)
        );
    }

    #[test]
    fn test_role_change_rules() {
        let admin = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(authorize_role_change(UserRole::Admin, admin, other).is_ok());
        assert_eq!(
            authorize_role_change(UserRole::Admin, admin, admin),
            Err(PermissionError::SelfRoleChange)
        );
        assert_eq!(
            authorize_role_change(UserRole::ReadOnly, other, admin),
            Err(PermissionError::UserManagement)
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PermissionError::ToggleMutation.to_string(),
            "Admin access required to modify toggles"
        );
        assert_eq!(
            PermissionError::SelfRoleChange.to_string(),
            "You cannot change your own role"
        );
    }
}
