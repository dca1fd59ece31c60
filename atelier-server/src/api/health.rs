//! Health Check API Handlers

use atelier_core::dto::health::{HealthResponse, ServiceInfo};
use axum::{Json, extract::State};

use crate::service::health_service;
use crate::state::AppState;

/// GET /
/// Service banner
pub async fn root() -> Json<ServiceInfo> {
    Json(health_service::service_info())
}

/// GET /health
/// Queue, job and device snapshot
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_service::health(&state))
}
