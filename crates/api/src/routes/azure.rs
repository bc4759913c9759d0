//! Azure subscription listing and store discovery on behalf of the caller.

use std::sync::Arc;

use axum::{extract::State, Json};
use domain::models::{DiscoveredResource, SubscriptionInfo};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::token_exchange::TokenExchangeError;
use crate::services::OnBehalfOfClient;

fn obo_client(state: &AppState) -> Result<Arc<OnBehalfOfClient>, ApiError> {
    state
        .obo
        .clone()
        .ok_or_else(|| TokenExchangeError::NotConfigured.into())
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<SubscriptionInfo>>, ApiError> {
    let obo = obo_client(&state)?;
    let subscriptions = state
        .discovery
        .list_subscriptions(&obo, &current.access_token)
        .await?;
    Ok(Json(subscriptions))
}

pub async fn discover_resources(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<DiscoveredResource>>, ApiError> {
    let obo = obo_client(&state)?;
    let resources = state
        .discovery
        .discover(&obo, &current.access_token)
        .await?;
    Ok(Json(resources))
}
