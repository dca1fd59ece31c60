//! Service Module
//!
//! Business logic layer for the server.
//! Services sit between the HTTP handlers and the job store and queue.

pub mod health;
pub mod job;

// Re-export for convenience
pub use health as health_service;
pub use job as job_service;
