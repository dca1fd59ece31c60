//! Error types for the Atelier runner

use atelier_core::domain::request::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

use crate::service::supervisor::ExecutionMode;

/// Errors from launching or supervising one process
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to capture {0} of the inference process")]
    MissingPipe(&'static str),

    #[error("failed while waiting for the inference process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Errors from scanning an output directory
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read output directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove stale image {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end an image generation attempt
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported device type '{0}'")]
    UnsupportedDevice(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("inference project not found (searched: {})", format_paths(.0))]
    ProjectNotFound(Vec<PathBuf>),

    #[error("failed to prepare {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("{mode} inference {reason}\n{tail}")]
    InferenceFailed {
        mode: ExecutionMode,
        reason: String,
        tail: String,
    },

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("inference produced no images in {}", .0.display())]
    NoImages(PathBuf),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
