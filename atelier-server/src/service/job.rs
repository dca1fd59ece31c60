//! Job Service
//!
//! Business logic for job submission, status lookup and result access.

use atelier_core::domain::job::{Job, JobStatus};
use atelier_core::domain::request::{GenerationRequest, ValidationError};
use atelier_core::dto::job::{JobStatusResponse, SubmitResponse};
use std::path::PathBuf;

use crate::repository::{QueueEntry, StoreError};
use crate::state::AppState;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(String),
    ValidationError(String),
    /// No inference pipeline is available
    Unavailable,
    NotCompleted(String),
    ImageNotFound(String),
    QueueUnavailable,
    Store(StoreError),
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        JobError::Store(err)
    }
}

/// Create a pending job and queue it for the worker
pub fn submit_job(state: &AppState, request: GenerationRequest) -> Result<SubmitResponse, JobError> {
    ensure_pipeline(state)?;
    request
        .validate()
        .map_err(|e| JobError::ValidationError(e.to_string()))?;

    let response = enqueue(state, request, "Task submitted and waiting in queue")?;

    tracing::info!("Task submitted: {}", response.request_id);
    tracing::info!("Queue length: {}", state.queue.len());

    Ok(response)
}

/// Submit several requests; nothing is created unless all of them are valid
pub fn submit_batch(
    state: &AppState,
    requests: Vec<GenerationRequest>,
) -> Result<Vec<SubmitResponse>, JobError> {
    ensure_pipeline(state)?;

    if requests.is_empty() {
        return Err(JobError::ValidationError(
            ValidationError::EmptyBatch.to_string(),
        ));
    }

    for (index, request) in requests.iter().enumerate() {
        request
            .validate()
            .map_err(|e| JobError::ValidationError(format!("request {}: {}", index, e)))?;
    }

    let responses = requests
        .into_iter()
        .map(|request| enqueue(state, request, "Batch task submitted"))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!("Batch submitted: {} tasks", responses.len());

    Ok(responses)
}

/// Get the public status of a job
pub fn get_job(state: &AppState, id: &str) -> Result<JobStatusResponse, JobError> {
    let job = state
        .store
        .get(id)
        .ok_or_else(|| JobError::NotFound(id.to_string()))?;

    Ok(JobStatusResponse::from(job))
}

/// Locate the file behind one of a completed job's results
pub fn resolve_image(state: &AppState, id: &str, index: usize) -> Result<PathBuf, JobError> {
    let job = state
        .store
        .get(id)
        .ok_or_else(|| JobError::NotFound(id.to_string()))?;

    if job.status != JobStatus::Completed {
        return Err(JobError::NotCompleted(id.to_string()));
    }

    let file_name = job
        .result_urls
        .get(index)
        .and_then(|url| url.rsplit('/').next())
        .filter(|name| !name.is_empty() && *name != "..")
        .ok_or_else(|| JobError::ImageNotFound(format!("{} has no image {}", id, index)))?;

    let path = state.images_dir.join(id).join(file_name);
    if !path.is_file() {
        return Err(JobError::ImageNotFound(format!(
            "image file for {} is missing",
            id
        )));
    }

    Ok(path)
}

fn ensure_pipeline(state: &AppState) -> Result<(), JobError> {
    if state.pipeline.is_none() {
        return Err(JobError::Unavailable);
    }
    Ok(())
}

fn enqueue(
    state: &AppState,
    request: GenerationRequest,
    message: &str,
) -> Result<SubmitResponse, JobError> {
    let id = Job::generate_id();
    let estimated_time = request.estimated_seconds();

    let job = state.store.create(&id, request.clone())?;
    state
        .queue
        .enqueue(QueueEntry {
            job_id: id.clone(),
            request,
        })
        .map_err(|_| JobError::QueueUnavailable)?;

    Ok(SubmitResponse {
        request_id: id,
        status: job.status,
        message: message.to_string(),
        estimated_time,
    })
}
