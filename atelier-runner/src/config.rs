//! Runner configuration
//!
//! Defines where the inference project and model weights live, how many
//! devices a run may use, and how external processes are launched.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device type backed by the NPU pipeline
pub const DEVICE_TYPE_NPU: &str = "npu";

/// Runner configuration
///
/// All paths and launch commands are configurable so the same binary can
/// drive a real accelerator host or a stub inference script in tests.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the main model weights
    pub model_path: String,

    /// Path to the auxiliary text encoder weights
    pub extra_model_path: String,

    /// Inference project directory; auto-detected when unset
    pub project_path: Option<PathBuf>,

    /// Accelerator type (only "npu" is supported)
    pub device_type: String,

    /// Default number of devices per job
    pub device_count: u32,

    /// Root directory for generated images (one subdirectory per job)
    pub output_dir: PathBuf,

    /// Launcher for distributed runs
    pub torchrun_bin: String,

    /// Interpreter for single-device runs
    pub python_bin: String,

    /// Inference entry point, relative to the project directory
    pub inference_script: String,

    /// Wall-clock ceiling for one inference process
    pub inference_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model_path: "/data/HiDream-I1-Full".to_string(),
            extra_model_path: "/data/Llama-3.1-8B-Instruct".to_string(),
            project_path: None,
            device_type: DEVICE_TYPE_NPU.to_string(),
            device_count: 1,
            output_dir: PathBuf::from("generated_images"),
            torchrun_bin: "torchrun".to_string(),
            python_bin: "python3".to_string(),
            inference_script: "inference.py".to_string(),
            inference_timeout: Some(Duration::from_secs(7200)),
        }
    }
}

impl RunnerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - HIDREAM_MODEL_PATH (default: /data/HiDream-I1-Full)
    /// - HIDREAM_EXTRA_MODEL_PATH (default: /data/Llama-3.1-8B-Instruct)
    /// - HIDREAM_PROJECT_PATH (default: auto-detected)
    /// - DEVICE_TYPE (default: npu)
    /// - DEVICE_COUNT (default: 1)
    /// - OUTPUT_DIR (default: generated_images)
    /// - TORCHRUN_BIN, PYTHON_BIN, INFERENCE_SCRIPT
    /// - INFERENCE_TIMEOUT (seconds, default: 7200, 0 disables)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let device_count = match std::env::var("DEVICE_COUNT") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("DEVICE_COUNT must be a positive integer, got '{}'", raw))?,
            Err(_) => defaults.device_count,
        };

        let inference_timeout = match std::env::var("INFERENCE_TIMEOUT") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => anyhow::bail!("INFERENCE_TIMEOUT must be a number of seconds, got '{}'", raw),
            },
            Err(_) => defaults.inference_timeout,
        };

        Ok(Self {
            model_path: env_or("HIDREAM_MODEL_PATH", defaults.model_path),
            extra_model_path: env_or("HIDREAM_EXTRA_MODEL_PATH", defaults.extra_model_path),
            project_path: std::env::var("HIDREAM_PROJECT_PATH").ok().map(PathBuf::from),
            device_type: env_or("DEVICE_TYPE", defaults.device_type),
            device_count,
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            torchrun_bin: env_or("TORCHRUN_BIN", defaults.torchrun_bin),
            python_bin: env_or("PYTHON_BIN", defaults.python_bin),
            inference_script: env_or("INFERENCE_SCRIPT", defaults.inference_script),
            inference_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device_count == 0 {
            anyhow::bail!("device_count must be greater than 0");
        }

        if self.model_path.is_empty() || self.extra_model_path.is_empty() {
            anyhow::bail!("model paths cannot be empty");
        }

        if self.inference_script.is_empty() {
            anyhow::bail!("inference_script cannot be empty");
        }

        if self.inference_timeout == Some(Duration::ZERO) {
            anyhow::bail!("inference_timeout must be greater than 0 when set");
        }

        Ok(())
    }

    /// Directories searched for the inference project, in order
    ///
    /// An explicit `project_path` short-circuits the search.
    pub fn project_candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.project_path {
            return vec![path.clone()];
        }

        let mut candidates = vec![
            PathBuf::from("/workspace/HiDream-I1"),
            PathBuf::from("/data/HiDream-I1"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join("HiDream-I1"));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("HiDream-I1"));
            if let Some(parent) = cwd.parent() {
                candidates.push(parent.join("HiDream-I1"));
            }
            candidates.push(cwd);
        }
        candidates
    }

    /// Finds the first candidate directory containing the inference script
    pub fn detect_project_path(&self) -> Option<PathBuf> {
        self.project_candidates()
            .into_iter()
            .find(|dir| contains_script(dir, &self.inference_script))
    }
}

fn contains_script(dir: &Path, script: &str) -> bool {
    dir.is_dir() && dir.join(script).is_file()
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}
