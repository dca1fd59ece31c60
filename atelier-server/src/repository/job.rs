//! Job Repository
//!
//! In-memory store of job records, shared by the HTTP handlers (readers and
//! job creation) and the worker loop (the only writer after creation).

use atelier_core::domain::job::{Job, JobStatus};
use atelier_core::domain::request::GenerationRequest;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Repository error type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("job {0} already exists")]
    DuplicateId(String),

    #[error("job {0} not found")]
    NotFound(String),
}

/// Authoritative mapping from job id to job state
///
/// Every read returns a full snapshot and every update runs under the write
/// lock, so no reader can observe a partially applied change.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new pending job
    pub fn create(&self, id: &str, request: GenerationRequest) -> Result<Job, StoreError> {
        let mut jobs = self.write();
        if jobs.contains_key(id) {
            return Err(StoreError::DuplicateId(id.to_string()));
        }

        let job = Job::new(id, request);
        jobs.insert(id.to_string(), job.clone());
        Ok(job)
    }

    /// Snapshot of a job
    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Applies `mutate` to a job atomically and returns its result
    pub fn update<R>(&self, id: &str, mutate: impl FnOnce(&mut Job) -> R) -> Result<R, StoreError> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(mutate(job))
    }

    /// Raises a running job's progress; lower values are ignored
    pub fn advance_progress(&self, id: &str, progress: u8) -> Result<bool, StoreError> {
        self.update(id, |job| job.advance(progress))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of jobs currently in `status`
    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.read().values().filter(|job| job.status == status).count()
    }

    // poisoned locks are recovered; records only change through `Job` methods
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
