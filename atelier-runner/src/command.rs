//! Inference command construction
//!
//! Builds the distributed (torchrun) and single-device command lines for a
//! job. Both shapes are derived from the job's own request, so a fallback run
//! reproduces exactly what was asked for.

use atelier_core::domain::request::{GenerationRequest, Resolution};
use atelier_core::domain::topology::Topology;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::RunnerConfig;
use crate::execution::ExecutionRequest;

/// Accelerator stream/collective timeout forwarded to the process, in seconds
const ACCELERATOR_TIMEOUT_SECS: &str = "7200";

/// One job as seen by the execution layer
#[derive(Debug, Clone)]
pub struct InferenceJob {
    pub job_id: String,
    pub request: GenerationRequest,
    /// Parsed form of `request.resolution`, forwarded in canonical `WxH` form
    pub resolution: Resolution,
    /// Devices this attempt may use
    pub device_count: u32,
    /// Directory the executable writes images into
    pub output_dir: PathBuf,
    /// Plain-text file holding the prompt
    pub prompt_file: PathBuf,
}

impl InferenceJob {
    /// Path of the metadata file the executable writes next to the images
    pub fn info_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}_info.json", self.job_id))
    }

    /// The same job restricted to a single device
    pub fn single_device(&self) -> Self {
        Self {
            device_count: 1,
            ..self.clone()
        }
    }
}

/// Builds execution requests for the configured inference project
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    torchrun_bin: String,
    python_bin: String,
    script: String,
    model_path: String,
    extra_model_path: String,
    project_path: PathBuf,
    timeout: Option<Duration>,
}

impl CommandBuilder {
    pub fn new(config: &RunnerConfig, project_path: impl Into<PathBuf>) -> Self {
        Self {
            torchrun_bin: config.torchrun_bin.clone(),
            python_bin: config.python_bin.clone(),
            script: config.inference_script.clone(),
            model_path: config.model_path.clone(),
            extra_model_path: config.extra_model_path.clone(),
            project_path: project_path.into(),
            timeout: config.inference_timeout,
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// torchrun launch across `job.device_count` devices
    pub fn distributed(&self, job: &InferenceJob, topology: Topology) -> ExecutionRequest {
        let devices = job.device_count.to_string();

        ExecutionRequest::new(&self.torchrun_bin, &self.project_path)
            .arg(format!("--nproc_per_node={}", devices))
            .args(["--standalone", "--nnodes=1"])
            .arg(&self.script)
            .args(["--enable_parallelism", "True"])
            .arg("--tp_size")
            .arg(topology.tp_size.to_string())
            .arg("--ep_size")
            .arg(topology.ep_size.to_string())
            .args(self.common_args(job))
            .env("HCCL_TIMEOUT", ACCELERATOR_TIMEOUT_SECS)
            .env("HCCL_BUFFSIZE", "2048")
            .env("HCCL_SINGLE_NODE", "1")
            .env("HCCL_LOCAL_RANK_NUM", devices)
            .env("HCCL_WHITELIST_DISABLE", "1")
            .env("HCCL_SECURITY_ENABLE", "0")
            .env("ACL_STREAM_TIMEOUT", ACCELERATOR_TIMEOUT_SECS)
            .env("PYTORCH_NPU_ALLOC_CONF", "max_split_size_mb:512")
            .env("TOKENIZERS_PARALLELISM", "false")
            .timeout(self.timeout)
    }

    /// Plain interpreter launch on device 0
    pub fn single(&self, job: &InferenceJob) -> ExecutionRequest {
        ExecutionRequest::new(&self.python_bin, &self.project_path)
            .arg(&self.script)
            .args(self.common_args(job))
            .args(["--device_id", "0"])
            .env("ACL_STREAM_TIMEOUT", ACCELERATOR_TIMEOUT_SECS)
            .env("PYTORCH_NPU_ALLOC_CONF", "max_split_size_mb:512")
            .env("TOKENIZERS_PARALLELISM", "false")
            .env("HCCL_DISABLE", "1")
            .timeout(self.timeout)
    }

    fn common_args(&self, job: &InferenceJob) -> Vec<String> {
        let request = &job.request;

        vec![
            "--model_path".to_string(),
            self.model_path.clone(),
            "--model_path_extra".to_string(),
            self.extra_model_path.clone(),
            "--prompt_file".to_string(),
            job.prompt_file.display().to_string(),
            "--prompt_file_type".to_string(),
            "plain".to_string(),
            "--info_file_save_path".to_string(),
            job.info_file().display().to_string(),
            "--save_dir".to_string(),
            job.output_dir.display().to_string(),
            "--num_images_per_prompt".to_string(),
            request.num_images_per_prompt.to_string(),
            "--resolution".to_string(),
            job.resolution.to_string(),
            "--num_inference_steps".to_string(),
            request.num_inference_steps.to_string(),
            "--batch_size".to_string(),
            request.batch_size.to_string(),
            "--infer_type".to_string(),
            request.infer_type.to_string(),
        ]
    }
}
