//! Shared application state

use atelier_runner::ImagePipeline;
use std::path::PathBuf;
use std::sync::Arc;

use crate::repository::{JobQueue, JobStore};

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub queue: JobQueue,
    /// `None` when no inference backend could be initialised
    pub pipeline: Option<Arc<dyn ImagePipeline>>,
    /// Root directory of generated images, one subdirectory per job
    pub images_dir: PathBuf,
}
