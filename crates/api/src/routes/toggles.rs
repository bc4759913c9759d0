//! Feature toggle endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use domain::models::{FeatureToggle, ToggleListResponse, UpdateToggleRequest};
use domain::services::authorize_toggle_mutation;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::ToggleService;

/// Reads the store's flags, refreshes the cache and returns it.
pub async fn list_toggles(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<ToggleListResponse>, ApiError> {
    let service = ToggleService::new(state.pool.clone(), state.flag_store.clone());
    Ok(Json(service.list(resource_id).await?))
}

/// The body is parsed only after the role check, so read-only callers get
/// 403 whatever they send.
pub async fn update_toggle(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((resource_id, toggle_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<FeatureToggle>, ApiError> {
    authorize_toggle_mutation(current.user.role)?;

    let request: UpdateToggleRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))?;

    let service = ToggleService::new(state.pool.clone(), state.flag_store.clone());
    let toggle = service
        .mutate(&current.user, resource_id, toggle_id, &request)
        .await?;
    Ok(Json(toggle))
}
