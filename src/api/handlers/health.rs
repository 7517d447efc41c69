//! Health check endpoint.

use axum::{extract::State, Json};
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
/// Returns service health information.
///
/// The service is degraded while the ingester is not streaming and unhealthy
/// when the database cannot be reached.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let ingester_streaming = state.ingester_streaming.load(Ordering::Relaxed);

    let (database_status, total_transfers, latest_block) = match state.repository.health_check().await {
        Ok(()) => (
            HealthStatus::Healthy,
            state.repository.count_transfers().await?,
            state.repository.latest_block().await?,
        ),
        Err(_) => (HealthStatus::Unhealthy, 0, None),
    };

    let status = match (database_status, ingester_streaming) {
        (HealthStatus::Healthy, true) => HealthStatus::Healthy,
        (HealthStatus::Healthy, false) => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    };

    Ok(Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        database_status,
        ingester_streaming,
        total_transfers,
        latest_block,
    }))
}
