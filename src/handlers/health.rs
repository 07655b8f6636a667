use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use std::time::SystemTime;
use tracing::info;

use super::AppState;
use crate::models::{HealthResponse, RateLimitStatus, ServiceStatus};
use crate::services::LopdfExtractor;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let pdf_extractor = LopdfExtractor::new().is_available();
    let artifact_store = state.service.is_ready();
    let (total_requests, rejected_requests, available_permits) = state.service.limiter().metrics();

    let status = if pdf_extractor && artifact_store {
        "healthy"
    } else {
        "degraded"
    };

    info!(
        status = status,
        artifact_store = artifact_store,
        "Health check completed"
    );

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceStatus {
            pdf_extractor,
            artifact_store,
        },
        rate_limiting: RateLimitStatus::new(total_requests, rejected_requests, available_permits),
    })
}

/// Readiness check endpoint
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if state.service.is_ready() {
        StatusCode::OK
    } else {
        info!("Readiness check failed - artifact store unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
