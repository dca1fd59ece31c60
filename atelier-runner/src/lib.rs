//! Atelier Runner
//!
//! Executes image generation jobs by launching the external inference
//! project, either distributed across several accelerator devices or on a
//! single device as a fallback.
//!
//! Architecture:
//! - Configuration: model and project locations, device count, launchers
//! - Commands: distributed and single-device command lines for a job
//! - Progress: output-driven progress inference
//! - Services: process runner, fallback supervisor, result collector and
//!   the pipeline combining them

pub mod command;
pub mod config;
pub mod error;
pub mod execution;
pub mod progress;
pub mod service;

pub use config::RunnerConfig;
pub use error::{CollectError, PipelineError, RunnerError};
pub use progress::{NoopProgressSink, ProgressSink};
pub use service::{ImagePipeline, create_pipeline};
