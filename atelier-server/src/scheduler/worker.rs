//! Job worker
//!
//! Single sequential consumer of the job queue. Each dequeued job runs
//! through the image pipeline to completion before the next one starts, and
//! every outcome is written back into the job store.

use atelier_runner::{ImagePipeline, ProgressSink};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::repository::{JobReceiver, JobStore, QueueEntry, QueueError, StoreError};

/// Faults of the worker loop itself, as opposed to job failures
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("pipeline task for job {job_id} aborted: {reason}")]
    TaskAborted { job_id: String, reason: String },
}

/// Forwards pipeline progress into the job store
struct JobProgressSink {
    store: Arc<JobStore>,
    job_id: String,
}

impl ProgressSink for JobProgressSink {
    fn report(&self, progress: u8) {
        match self.store.advance_progress(&self.job_id, progress) {
            Ok(true) => debug!("Job {} progress: {}%", self.job_id, progress),
            Ok(false) => {}
            Err(e) => warn!("Failed to record progress for job {}: {}", self.job_id, e),
        }
    }
}

/// Worker that drains the job queue one job at a time
pub struct JobWorker {
    store: Arc<JobStore>,
    receiver: JobReceiver,
    pipeline: Arc<dyn ImagePipeline>,
    api_base_url: String,
    idle_interval: Duration,
    error_backoff: Duration,
}

impl JobWorker {
    pub fn new(
        store: Arc<JobStore>,
        receiver: JobReceiver,
        pipeline: Arc<dyn ImagePipeline>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            receiver,
            pipeline,
            api_base_url: api_base_url.into(),
            idle_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }

    /// Overrides the empty-queue wait and the fault backoff
    pub fn with_intervals(mut self, idle_interval: Duration, error_backoff: Duration) -> Self {
        self.idle_interval = idle_interval;
        self.error_backoff = error_backoff;
        self
    }

    /// Runs the worker loop; never returns
    pub async fn run(mut self) {
        info!(
            "Starting job worker (idle: {:?}, backoff: {:?})",
            self.idle_interval, self.error_backoff
        );

        loop {
            if let Err(e) = self.tick().await {
                error!("Worker loop fault: {:#}", e);
                time::sleep(self.error_backoff).await;
            }
        }
    }

    /// Waits for one job and processes it
    ///
    /// Returns whether a job was taken from the queue.
    pub async fn tick(&mut self) -> Result<bool, WorkerError> {
        match self.receiver.next(self.idle_interval).await? {
            Some(entry) => {
                self.process(entry).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process(&self, entry: QueueEntry) -> Result<(), WorkerError> {
        let QueueEntry { job_id, request } = entry;

        if !self.store.update(&job_id, |job| job.start())? {
            warn!("Job {} is no longer pending, skipping", job_id);
            return Ok(());
        }
        info!("Processing job {}", job_id);

        let started = Instant::now();
        let sink: Arc<dyn ProgressSink> = Arc::new(JobProgressSink {
            store: self.store.clone(),
            job_id: job_id.clone(),
        });

        // a panicking pipeline must not take the worker down with it
        let pipeline = self.pipeline.clone();
        let task_id = job_id.clone();
        let handle =
            tokio::spawn(async move { pipeline.generate(&task_id, &request, sink).await });

        match handle.await {
            Ok(Ok(images)) => {
                let urls: Vec<String> = images
                    .iter()
                    .filter_map(|path| self.result_url(&job_id, path))
                    .collect();
                let elapsed = started.elapsed().as_secs_f64();
                let count = urls.len();

                self.store.update(&job_id, |job| job.complete(urls, elapsed))?;
                info!(
                    "Job {} completed in {:.2}s with {} image(s)",
                    job_id, elapsed, count
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Job {} failed: {}", job_id, e);
                self.store.update(&job_id, |job| job.fail(e.to_string()))?;
                Ok(())
            }
            Err(e) => {
                self.store
                    .update(&job_id, |job| job.fail("internal error while generating images"))?;
                Err(WorkerError::TaskAborted {
                    job_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Public link for an image file of `job_id`
    fn result_url(&self, job_id: &str, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        Some(format!(
            "{}/images/{}/{}",
            self.api_base_url, job_id, file_name
        ))
    }
}
