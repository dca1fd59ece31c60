//! Service layer
//!
//! Services turn a queued job into generated images: the process runner
//! launches the inference executable, the supervisor decides between
//! distributed and single-device execution, the collector picks up results
//! and the pipeline ties them together for one job.
//!
//! The seams are trait-based so the server and tests can swap in their own
//! implementations.

pub mod collector;
pub mod pipeline;
pub mod process;
pub mod supervisor;

// Re-export traits
pub use pipeline::ImagePipeline;
pub use process::InferenceRunner;

// Re-export implementations
pub use collector::collect_images;
pub use pipeline::{NpuPipeline, create_pipeline};
pub use process::ProcessRunner;
pub use supervisor::{ExecutionMode, FallbackSupervisor, SupervisedRun};
