//! Job DTOs for the submission and status endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobStatus};
use crate::domain::request::GenerationRequest;

/// Response to a single submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub status: JobStatus,
    pub message: String,
    /// Estimated processing time in seconds
    pub estimated_time: u64,
}

/// Request to submit several jobs at once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<GenerationRequest>,
}

/// Public view of a job's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default)]
    pub result_urls: Vec<String>,
    /// Empty unless the job failed
    #[serde(default)]
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time: Option<f64>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            request_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            result_urls: job.result_urls.clone(),
            error: job.error.clone().unwrap_or_default(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            processing_time: job.processing_time,
        }
    }
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self::from(&job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_field_names() {
        let job = Job::new("img_0123456789abcdef", GenerationRequest::new("p"));
        let value = serde_json::to_value(JobStatusResponse::from(&job)).unwrap();

        assert_eq!(value["requestId"], "img_0123456789abcdef");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["progress"], 0);
        assert_eq!(value["error"], "");
        assert!(value["result_urls"].as_array().unwrap().is_empty());
        assert!(value["completed_at"].is_null());
    }

    #[test]
    fn test_failed_job_exposes_error() {
        let mut job = Job::new("img_x", GenerationRequest::new("p"));
        job.start();
        job.fail("single-device inference failed with code 1");

        let view = JobStatusResponse::from(job);
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.contains("code 1"));
    }
}
