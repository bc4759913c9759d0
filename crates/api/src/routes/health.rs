//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use persistence::db::ping;
use persistence::metrics::record_pool_metrics;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check. 503 with the same body when the database is down.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let latency = ping(&state.pool).await;
    record_pool_metrics(&state.pool);

    let connected = latency.is_ok();
    if let Err(e) = &latency {
        tracing::warn!("Database health check failed: {}", e);
    }

    let response = HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: DatabaseHealth {
            connected,
            latency_ms: latency.ok().map(|d| d.as_millis() as u64),
        },
    };

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness probe. 200 while the process runs.
pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe. 200 once the database answers.
pub async fn readiness(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    match ping(&state.pool).await {
        Ok(_) => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}
