//! Repository Module
//!
//! In-memory data layer for the server: the job store and the job queue.

pub mod job;
pub mod queue;

// Re-export for convenience
pub use job::{JobStore, StoreError};
pub use queue::{JobQueue, JobReceiver, QueueEntry, QueueError, job_queue};
