//! User endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::{UpdateUserRoleRequest, User};
use domain::services::authorize_role_change;
use persistence::repositories::UserRepository;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// The caller's own record.
pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// Every user, oldest first. Admin only.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = UserRepository::new(state.pool.clone()).list().await?;
    Ok(Json(users))
}

/// Sets a user's role. Admin only; nobody may change their own role.
pub async fn update_user_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRoleRequest>,
) -> Result<Json<User>, ApiError> {
    authorize_role_change(current.user.role, current.user.id, user_id)?;

    let user = UserRepository::new(state.pool.clone())
        .update_role(user_id, request.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(
        target_user_id = %user.id,
        role = %user.role,
        changed_by = %current.user.id,
        "User role changed"
    );
    Ok(Json(user))
}
