//! Toggle listing and mutation.
//!
//! The remote store is authoritative. Listing refreshes the local cache;
//! mutation writes the store first and only then records the change locally.

use std::sync::Arc;

use domain::models::{
    AppConfigResource, FeatureToggle, ToggleListResponse, UpdateToggleRequest, User,
};
use domain::services::{authorize_toggle_mutation, AuditLogBuilder, FeatureFlagStore};
use persistence::repositories::{FeatureToggleRepository, ResourceRepository};
use shared::connection_string::ConnectionString;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::metrics::record_toggle_mutation;

pub struct ToggleService {
    resources: ResourceRepository,
    toggles: FeatureToggleRepository,
    flag_store: Arc<dyn FeatureFlagStore>,
}

fn credentials(resource: &AppConfigResource) -> Result<ConnectionString, ApiError> {
    ConnectionString::parse(&resource.connection_string).map_err(|e| {
        ApiError::Validation(format!(
            "Stored connection string for {} is invalid: {}",
            resource.display_name, e
        ))
    })
}

impl ToggleService {
    pub fn new(pool: PgPool, flag_store: Arc<dyn FeatureFlagStore>) -> Self {
        Self {
            resources: ResourceRepository::new(pool.clone()),
            toggles: FeatureToggleRepository::new(pool),
            flag_store,
        }
    }

    async fn resource(&self, resource_id: Uuid) -> Result<AppConfigResource, ApiError> {
        self.resources
            .find_by_id(resource_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))
    }

    /// Reads every flag of the resource's store and refreshes the cache.
    pub async fn list(&self, resource_id: Uuid) -> Result<ToggleListResponse, ApiError> {
        let resource = self.resource(resource_id).await?;
        let flags = self.flag_store.list_flags(&credentials(&resource)?).await?;
        let toggles = self.toggles.sync_flags(resource.id, &flags).await?;

        Ok(ToggleListResponse {
            resource_id: resource.id,
            environment_type: resource.environment_type,
            requires_confirmation: resource.environment_type.requires_confirmation(),
            toggles,
        })
    }

    /// Flips one toggle on behalf of `actor`.
    ///
    /// The requested state must be the negation of the current remote state;
    /// anything else means the caller's view is stale.
    pub async fn mutate(
        &self,
        actor: &User,
        resource_id: Uuid,
        toggle_id: Uuid,
        request: &UpdateToggleRequest,
    ) -> Result<FeatureToggle, ApiError> {
        authorize_toggle_mutation(actor.role)?;

        let requested = request
            .requested_state()
            .ok_or_else(|| ApiError::Validation("enabled must be a boolean".to_string()))?;

        let toggle = self
            .toggles
            .find_by_id(toggle_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Toggle not found".to_string()))?;
        if toggle.resource_id != resource_id {
            return Err(ApiError::Validation(
                "Toggle does not belong to this resource".to_string(),
            ));
        }
        let resource = self.resource(resource_id).await?;
        let credentials = credentials(&resource)?;

        let current = self
            .flag_store
            .get_flag(&credentials, &toggle.key, &toggle.label)
            .await?;
        let new_state = !current.enabled;
        if requested != new_state {
            return Err(ApiError::Conflict(format!(
                "Toggle {} is already {}. Refresh and try again.",
                toggle.name,
                if current.enabled { "enabled" } else { "disabled" }
            )));
        }

        let updated = current
            .with_enabled(new_state)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        self.flag_store.put_flag(&credentials, &updated).await?;

        let audit = AuditLogBuilder::toggle_change(actor, current.enabled, new_state)
            .toggle(toggle.id, toggle.name.clone())
            .resource(resource.id, resource.display_name.clone(), resource.environment_type)
            .build();
        let (toggle, entry) = self
            .toggles
            .record_mutation(toggle.id, new_state, actor.actor_name(), &audit)
            .await?;

        record_toggle_mutation(resource.environment_type, entry.action);
        info!(
            toggle_id = %toggle.id,
            toggle = %toggle.name,
            resource_id = %resource.id,
            environment = %resource.environment_type,
            user_id = %actor.id,
            previous_state = entry.previous_state,
            new_state = entry.new_state,
            "Feature toggle changed"
        );

        Ok(toggle)
    }
}
