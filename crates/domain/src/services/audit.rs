//! Builder for toggle audit entries.
//!
//! Handlers describe a change fluently and hand the result to the
//! repository, which writes it in the same transaction as the toggle update.

use uuid::Uuid;

use crate::models::{AuditAction, EnvironmentType, NewAuditLogEntry, User};

/// Fluent builder for [`NewAuditLogEntry`].
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    user_id: Uuid,
    user_name: String,
    user_email: String,
    previous_state: bool,
    new_state: bool,
    toggle_id: Uuid,
    toggle_name: String,
    resource_id: Uuid,
    resource_name: String,
    environment_type: EnvironmentType,
}

impl AuditLogBuilder {
    /// Start an entry for `actor` changing a toggle from `previous` to `new`.
    pub fn toggle_change(actor: &User, previous: bool, new: bool) -> Self {
        Self {
            user_id: actor.id,
            user_name: actor.actor_name().to_string(),
            user_email: actor.email.clone(),
            previous_state: previous,
            new_state: new,
            toggle_id: Uuid::nil(),
            toggle_name: String::new(),
            resource_id: Uuid::nil(),
            resource_name: String::new(),
            environment_type: EnvironmentType::default(),
        }
    }

    /// Set the toggle being changed.
    pub fn toggle(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.toggle_id = id;
        self.toggle_name = name.into();
        self
    }

    /// Set the resource the toggle lives in.
    pub fn resource(
        mut self,
        id: Uuid,
        name: impl Into<String>,
        environment_type: EnvironmentType,
    ) -> Self {
        self.resource_id = id;
        self.resource_name = name.into();
        self.environment_type = environment_type;
        self
    }

    pub fn build(self) -> NewAuditLogEntry {
        NewAuditLogEntry {
            user_id: self.user_id,
            user_name: self.user_name,
            user_email: self.user_email,
            action: AuditAction::for_new_state(self.new_state),
            toggle_id: self.toggle_id,
            toggle_name: self.toggle_name,
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            environment_type: self.environment_type,
            previous_state: self.previous_state,
            new_state: self.new_state,
        }
    }
}
