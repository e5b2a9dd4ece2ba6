use axum::{response::IntoResponse, Json};
use chrono::Utc;
use tracing::debug;

use crate::models::HealthResponse;

/// Health check endpoint
///
/// GET /health
///
/// Mounted outside the authentication layer.
pub async fn health_check() -> impl IntoResponse {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
