//! Sign-in settings for the browser client.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;

/// Values the SPA needs to start an Azure AD sign-in. None are secret.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfigResponse {
    pub client_id: String,
    pub tenant_id: String,
    pub authority: String,
}

pub async fn public_config(State(state): State<AppState>) -> Json<PublicConfigResponse> {
    let azure_ad = &state.config.azure_ad;
    Json(PublicConfigResponse {
        client_id: azure_ad.client_id.clone(),
        tenant_id: azure_ad.tenant_id.clone(),
        authority: azure_ad.authority(),
    })
}
