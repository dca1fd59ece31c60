//! Job API Handlers
//!
//! HTTP endpoints for submitting jobs, polling their status and fetching
//! generated images.

use atelier_core::domain::request::GenerationRequest;
use atelier_core::dto::job::{BatchRequest, JobStatusResponse, SubmitResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::service::job_service;
use crate::state::AppState;

// =============================================================================
// Submission Endpoints
// =============================================================================

/// POST /submit
/// Queue one image generation request
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    tracing::debug!("Submitting request: {:?}", req.prompt);

    let response = job_service::submit_job(&state, req)?;
    Ok(Json(response))
}

/// POST /batch_submit
/// Queue several requests; all are validated before any is created
pub async fn batch_submit(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> ApiResult<Json<Vec<SubmitResponse>>> {
    tracing::debug!("Submitting batch of {} request(s)", req.requests.len());

    let responses = job_service::submit_batch(&state, req.requests)?;
    Ok(Json(responses))
}

// =============================================================================
// Status Endpoints
// =============================================================================

/// GET /status/{id}
/// Get the state of a job
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    tracing::debug!("Getting status: {}", id);

    let status = job_service::get_job(&state, &id)?;
    Ok(Json(status))
}

/// GET /download/{id}?image_index=N
/// Download one generated image of a completed job
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DownloadQuery>,
) -> ApiResult<Response> {
    tracing::debug!("Downloading image {} of {}", params.image_index, id);

    let path = job_service::resolve_image(&state, &id, params.image_index)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to read {}: {}", path.display(), e)))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("png")
        .to_ascii_lowercase();
    let disposition = format!(
        "attachment; filename=\"{}_image_{}.{}\"",
        id, params.image_index, extension
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&extension).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub image_index: usize,
}

fn content_type(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "image/png",
    }
}
