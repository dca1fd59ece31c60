//! Image generation pipeline
//!
//! Ties one job's preparation, supervised execution and result collection
//! together behind [`ImagePipeline`], which is all the server depends on.

use async_trait::async_trait;
use atelier_core::domain::request::GenerationRequest;
use atelier_core::domain::topology::Topology;
use atelier_core::dto::health::DeviceInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandBuilder, InferenceJob};
use crate::config::{DEVICE_TYPE_NPU, RunnerConfig};
use crate::error::PipelineError;
use crate::progress::{ProgressSink, RUNNER_START_PROGRESS};
use crate::service::collector::collect_images;
use crate::service::process::{InferenceRunner, ProcessRunner};
use crate::service::supervisor::FallbackSupervisor;

/// Progress reported once the job directory and prompt file exist
pub const PROGRESS_PREPARED: u8 = 20;

const PROMPT_FILE_SUFFIX: &str = "_prompt.txt";

/// Generates images for one job at a time
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Runs inference for `job_id` and returns the produced image files
    ///
    /// Images land in `<output_root>/<job_id>/`. An empty result is an error.
    async fn generate(
        &self,
        job_id: &str,
        request: &GenerationRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Vec<PathBuf>, PipelineError>;

    /// Accelerator layout reported by the health endpoint
    fn device_info(&self) -> DeviceInfo;

    /// Absolute directory holding one subdirectory per job
    fn output_root(&self) -> &Path;
}

/// Builds the pipeline for the configured device type
pub fn create_pipeline(config: RunnerConfig) -> Result<Arc<dyn ImagePipeline>, PipelineError> {
    if !config.device_type.eq_ignore_ascii_case(DEVICE_TYPE_NPU) {
        return Err(PipelineError::UnsupportedDevice(config.device_type));
    }

    Ok(Arc::new(NpuPipeline::new(config)?))
}

/// Pipeline driving the HiDream inference project on NPU devices
pub struct NpuPipeline {
    config: RunnerConfig,
    output_root: PathBuf,
    supervisor: FallbackSupervisor,
}

impl NpuPipeline {
    pub fn new(config: RunnerConfig) -> Result<Self, PipelineError> {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    /// Creates the pipeline with a custom process runner
    pub fn with_runner(
        config: RunnerConfig,
        runner: Arc<dyn InferenceRunner>,
    ) -> Result<Self, PipelineError> {
        let project_path = config
            .detect_project_path()
            .ok_or_else(|| PipelineError::ProjectNotFound(config.project_candidates()))?;

        std::fs::create_dir_all(&config.output_dir).map_err(|source| PipelineError::Workspace {
            path: config.output_dir.clone(),
            source,
        })?;
        // the inference process runs inside the project directory
        let output_root =
            config
                .output_dir
                .canonicalize()
                .map_err(|source| PipelineError::Workspace {
                    path: config.output_dir.clone(),
                    source,
                })?;

        let topology = Topology::for_devices(config.device_count);
        info!(
            "NPU pipeline ready: project={}, devices={}, tp={}, ep={}, output={}",
            project_path.display(),
            config.device_count,
            topology.tp_size,
            topology.ep_size,
            output_root.display()
        );

        let commands = CommandBuilder::new(&config, project_path);
        Ok(Self {
            config,
            output_root,
            supervisor: FallbackSupervisor::new(runner, commands),
        })
    }

    async fn prepare(&self, job_id: &str, request: &GenerationRequest) -> Result<InferenceJob, PipelineError> {
        let resolution = request.parsed_resolution()?;

        let output_dir = self.output_root.join(job_id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: output_dir.clone(),
                source,
            })?;

        let prompt_file = output_dir.join(format!("{}{}", job_id, PROMPT_FILE_SUFFIX));
        tokio::fs::write(&prompt_file, &request.prompt)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: prompt_file.clone(),
                source,
            })?;

        let device_count = request
            .device_count
            .unwrap_or(self.config.device_count)
            .max(1);

        Ok(InferenceJob {
            job_id: job_id.to_string(),
            request: request.clone(),
            resolution,
            device_count,
            output_dir,
            prompt_file,
        })
    }
}

#[async_trait]
impl ImagePipeline for NpuPipeline {
    async fn generate(
        &self,
        job_id: &str,
        request: &GenerationRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let job = self.prepare(job_id, request).await?;
        sink.report(PROGRESS_PREPARED);
        sink.report(RUNNER_START_PROGRESS);

        let result = self.supervisor.execute(&job, sink).await;
        let result = result.and_then(|run| {
            if run.fell_back {
                info!("Job {} completed after single-device fallback", job_id);
            }
            let images = collect_images(&job.output_dir, request.num_images_per_prompt as usize)?;
            if images.is_empty() {
                return Err(PipelineError::NoImages(job.output_dir.clone()));
            }
            Ok(images)
        });

        cleanup_prompt_files(&job.output_dir).await;
        result
    }

    fn device_info(&self) -> DeviceInfo {
        let topology = Topology::for_devices(self.config.device_count);
        DeviceInfo {
            device_type: self.config.device_type.to_uppercase(),
            device_count: self.config.device_count,
            tp_size: topology.tp_size,
            ep_size: topology.ep_size,
            visible_devices: std::env::var("ASCEND_RT_VISIBLE_DEVICES").unwrap_or_default(),
            project_path: self.supervisor.commands().project_path().display().to_string(),
        }
    }

    fn output_root(&self) -> &Path {
        &self.output_root
    }
}

/// Removes temporary prompt files, keeping the images
async fn cleanup_prompt_files(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to clean up {}: {}", dir.display(), e);
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to clean up {}: {}", dir.display(), e);
                break;
            }
        };

        let path = entry.path();
        let is_prompt = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(PROMPT_FILE_SUFFIX));
        if !is_prompt {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Cleaned up {}", path.display()),
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
