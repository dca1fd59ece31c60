//! Health Service

use atelier_core::domain::job::JobStatus;
use atelier_core::dto::health::{HealthResponse, ServiceInfo};

use crate::state::AppState;

/// Static description of the service
pub fn service_info() -> ServiceInfo {
    ServiceInfo {
        message: "Atelier image generation API".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Current queue, job and device state
pub fn health(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        pipeline_ready: state.pipeline.is_some(),
        queue_length: state.queue.len(),
        active_tasks: state.store.count_by_status(JobStatus::Processing),
        total_tasks: state.store.len(),
        device: state.pipeline.as_ref().map(|pipeline| pipeline.device_info()),
    }
}
