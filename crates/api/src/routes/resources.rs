//! App Configuration resource endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::{
    ConnectionStatus, CreateResourceRequest, DeleteResourceResponse, ResourceResponse,
    TestConnectionRequest, TestConnectionResponse, UpdateResourceRequest,
};
use domain::services::authorize_resource_management;
use persistence::repositories::ResourceRepository;
use shared::connection_string::{endpoint_of, is_masked, ConnectionString};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

fn authorize(state: &AppState, current: &CurrentUser) -> Result<(), ApiError> {
    authorize_resource_management(
        current.user.role,
        state.config.auth.admin_only_resource_management,
    )?;
    Ok(())
}

/// All resources, newest first.
pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceResponse>>, ApiError> {
    let resources = ResourceRepository::new(state.pool.clone()).list().await?;
    Ok(Json(resources.into_iter().map(Into::into).collect()))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<ResourceResponse>, ApiError> {
    let resource = ResourceRepository::new(state.pool.clone())
        .find_by_id(resource_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;
    Ok(Json(resource.into()))
}

pub async fn create_resource(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<ResourceResponse>), ApiError> {
    authorize(&state, &current)?;
    request.validate()?;

    let endpoint = endpoint_of(&request.connection_string);
    let resource = ResourceRepository::new(state.pool.clone())
        .create(&request, endpoint.as_deref())
        .await?;

    info!(
        resource_id = %resource.id,
        environment = %resource.environment_type,
        created_by = %current.user.id,
        "Resource registered"
    );
    Ok((StatusCode::CREATED, Json(resource.into())))
}

pub async fn update_resource(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(resource_id): Path<Uuid>,
    Json(request): Json<UpdateResourceRequest>,
) -> Result<Json<ResourceResponse>, ApiError> {
    authorize(&state, &current)?;
    request.validate()?;

    let endpoint = request.replacement_connection_string().and_then(endpoint_of);
    let resource = ResourceRepository::new(state.pool.clone())
        .update(resource_id, &request, endpoint.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    info!(
        resource_id = %resource.id,
        connection_string_replaced = request.replacement_connection_string().is_some(),
        updated_by = %current.user.id,
        "Resource updated"
    );
    Ok(Json(resource.into()))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<DeleteResourceResponse>, ApiError> {
    authorize(&state, &current)?;

    let deleted = ResourceRepository::new(state.pool.clone())
        .delete(resource_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Resource not found".to_string()));
    }

    info!(resource_id = %resource_id, deleted_by = %current.user.id, "Resource deleted");
    Ok(Json(DeleteResourceResponse {
        success: true,
        message: "Resource deleted successfully".to_string(),
    }))
}

/// Probes a store. The outcome is always reported in the body; when a
/// resource id is given its connection status is updated too.
pub async fn test_connection(
    State(state): State<AppState>,
    Json(request): Json<TestConnectionRequest>,
) -> Result<Json<TestConnectionResponse>, ApiError> {
    let repo = ResourceRepository::new(state.pool.clone());

    let supplied = request
        .connection_string
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !is_masked(v))
        .map(str::to_string);

    let stored = match request.resource_id {
        Some(resource_id) => Some(
            repo.find_by_id(resource_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?,
        ),
        None => None,
    };

    let raw = supplied
        .or_else(|| stored.map(|resource| resource.connection_string))
        .ok_or_else(|| {
            ApiError::Validation("A connection string or resource id is required".to_string())
        })?;

    let outcome = match ConnectionString::parse(&raw) {
        Ok(credentials) => state
            .flag_store
            .test_connection(&credentials)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let timestamp = Utc::now();

    if let Some(resource_id) = request.resource_id {
        let status = if outcome.is_ok() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Error
        };
        // Deleted while the connection test ran
        if !repo
            .update_connection_status(resource_id, status, timestamp)
            .await?
        {
            return Err(ApiError::NotFound("Resource not found".to_string()));
        }
    }

    let response = match outcome {
        Ok(()) => TestConnectionResponse {
            success: true,
            message: "Connection successful".to_string(),
            timestamp,
        },
        Err(message) => {
            warn!(resource_id = ?request.resource_id, error = %message, "Connection test failed");
            TestConnectionResponse {
                success: false,
                message: format!("Connection failed: {}", message),
                timestamp,
            }
        }
    };
    Ok(Json(response))
}
