//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::request::GenerationRequest;

/// Progress reported once a job leaves the queue
pub const PROGRESS_DEQUEUED: u8 = 10;

/// Highest progress a job may show before it completes
pub const PROGRESS_CEILING_BEFORE_COMPLETION: u8 = 95;

/// Progress of a completed job
pub const PROGRESS_COMPLETE: u8 = 100;

/// Image generation job record
///
/// Created by the gateway when a request is submitted and mutated only by
/// the worker while the job executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub result_urls: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds spent executing, set on completion
    pub processing_time: Option<f64>,
    pub request: GenerationRequest,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Job {
    /// Creates a pending job with zero progress
    pub fn new(id: impl Into<String>, request: GenerationRequest) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0,
            result_urls: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            processing_time: None,
            request,
        }
    }

    /// Generates a fresh job identifier (`img_` followed by 16 hex digits)
    pub fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("img_{}", &hex[..16])
    }

    /// Moves a pending job to processing
    ///
    /// Returns `false` (and changes nothing) if the job is not pending.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }

        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        self.progress = self.progress.max(PROGRESS_DEQUEUED);
        true
    }

    /// Raises the progress of a running job
    ///
    /// Progress never decreases and stays below 100 until completion.
    /// Returns whether the stored value changed.
    pub fn advance(&mut self, progress: u8) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let progress = progress.min(PROGRESS_CEILING_BEFORE_COMPLETION);
        if progress <= self.progress {
            return false;
        }

        self.progress = progress;
        true
    }

    /// Marks the job completed with its result references
    ///
    /// An empty result list is recorded as a failure instead, so a completed
    /// job always carries at least one result.
    pub fn complete(&mut self, result_urls: Vec<String>, processing_time: f64) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        if result_urls.is_empty() {
            return self.fail("inference produced no images");
        }

        self.status = JobStatus::Completed;
        self.progress = PROGRESS_COMPLETE;
        self.result_urls = result_urls;
        self.error = None;
        self.completed_at = Some(Utc::now());
        self.processing_time = Some(processing_time);
        true
    }

    /// Marks the job failed
    ///
    /// A blank description is replaced so a failed job always explains itself.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let error = error.into();
        let error = error.trim();

        self.status = JobStatus::Failed;
        self.result_urls.clear();
        self.error = Some(if error.is_empty() {
            "unknown error".to_string()
        } else {
            error.to_string()
        });
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Job {
        Job::new("img_test", GenerationRequest::new("p"))
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = pending();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.result_urls.is_empty());
        assert!(job.error.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_generate_id_format() {
        let id = Job::generate_id();
        assert!(id.starts_with("img_"));
        assert_eq!(id.len(), 20);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, Job::generate_id());
    }

    #[test]
    fn test_start_only_from_pending() {
        let mut job = pending();
        assert!(job.start());
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, PROGRESS_DEQUEUED);
        assert!(job.started_at.is_some());
        assert!(!job.start());
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let mut job = pending();
        job.start();

        assert!(job.advance(30));
        assert!(!job.advance(20));
        assert_eq!(job.progress, 30);

        assert!(job.advance(99));
        assert_eq!(job.progress, PROGRESS_CEILING_BEFORE_COMPLETION);
        assert!(!job.advance(100));
    }

    #[test]
    fn test_complete_sets_results() {
        let mut job = pending();
        job.start();
        assert!(job.complete(vec!["http://host/images/a.png".to_string()], 1.5));

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, PROGRESS_COMPLETE);
        assert_eq!(job.result_urls.len(), 1);
        assert_eq!(job.processing_time, Some(1.5));
        assert!(job.completed_at.is_some());

        // terminal: nothing changes afterwards
        assert!(!job.fail("late"));
        assert!(!job.advance(50));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_complete_without_results_fails() {
        let mut job = pending();
        job.start();
        job.complete(Vec::new(), 2.0);

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result_urls.is_empty());
        assert!(job.error.unwrap().contains("no images"));
    }

    #[test]
    fn test_fail_always_has_error() {
        let mut job = pending();
        job.start();
        job.fail("   ");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("unknown error"));
        assert!(job.completed_at.is_some());
        assert!(job.processing_time.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
