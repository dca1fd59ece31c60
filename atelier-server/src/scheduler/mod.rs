//! Scheduler layer for the server
//!
//! Runs queued jobs through the image pipeline, one at a time, and records
//! their lifecycle in the job store.

pub mod worker;

pub use worker::{JobWorker, WorkerError};
