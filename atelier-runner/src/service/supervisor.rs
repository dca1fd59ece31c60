//! Fallback supervisor
//!
//! Runs a job on its requested devices and, when a distributed run fails,
//! retries it exactly once on a single device. Single-device execution is the
//! baseline: a failure there is final. Images left behind by a failed
//! distributed run are discarded before the retry, so only a successful
//! attempt's output is ever collected.

use atelier_core::domain::topology::Topology;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::command::{CommandBuilder, InferenceJob};
use crate::error::PipelineError;
use crate::execution::ProcessOutcome;
use crate::progress::ProgressSink;
use crate::service::collector::remove_images;
use crate::service::process::InferenceRunner;

/// Output lines kept from a failed distributed run
pub const DISTRIBUTED_ERROR_TAIL: usize = 15;

/// Output lines kept from a failed single-device run
pub const SINGLE_ERROR_TAIL: usize = 10;

/// How an inference attempt was launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Distributed,
    SingleDevice,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Distributed => f.write_str("distributed"),
            ExecutionMode::SingleDevice => f.write_str("single-device"),
        }
    }
}

/// A successful supervised execution
#[derive(Debug, Clone)]
pub struct SupervisedRun {
    /// Mode of the attempt that succeeded
    pub mode: ExecutionMode,
    /// Whether a distributed failure was recovered on a single device
    pub fell_back: bool,
    pub outcome: ProcessOutcome,
}

/// Wraps an [`InferenceRunner`] with single-device fallback
pub struct FallbackSupervisor {
    runner: Arc<dyn InferenceRunner>,
    commands: CommandBuilder,
}

impl FallbackSupervisor {
    pub fn new(runner: Arc<dyn InferenceRunner>, commands: CommandBuilder) -> Self {
        Self { runner, commands }
    }

    pub fn commands(&self) -> &CommandBuilder {
        &self.commands
    }

    /// Executes `job`, falling back to one device at most once
    pub async fn execute(
        &self,
        job: &InferenceJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<SupervisedRun, PipelineError> {
        let mut fell_back = false;

        if job.device_count > 1 {
            match self.run_distributed(job, sink.clone()).await {
                Ok(outcome) => {
                    return Ok(SupervisedRun {
                        mode: ExecutionMode::Distributed,
                        fell_back: false,
                        outcome,
                    });
                }
                Err(e) => {
                    warn!("Multi-device run failed for job {}, trying single device", job.job_id);
                    warn!("Error: {}", e);
                    fell_back = true;
                }
            }

            let discarded = remove_images(&job.output_dir)?;
            if discarded > 0 {
                info!(
                    "Discarded {} image(s) from the failed multi-device run of job {}",
                    discarded, job.job_id
                );
            }
        }

        let single = job.single_device();
        info!("Starting single-device inference for job {}", single.job_id);

        let request = self.commands.single(&single);
        let outcome = self.runner.run(request, sink).await?;

        if !outcome.success() {
            let reason = outcome.failure_reason(self.commands.timeout());
            let tail = outcome.tail(SINGLE_ERROR_TAIL);
            warn!("Inference failed for job {}: {}", job.job_id, reason);
            return Err(PipelineError::InferenceFailed {
                mode: ExecutionMode::SingleDevice,
                reason,
                tail,
            });
        }

        if fell_back {
            info!("Job {} recovered on a single device", job.job_id);
        }

        Ok(SupervisedRun {
            mode: ExecutionMode::SingleDevice,
            fell_back,
            outcome,
        })
    }

    async fn run_distributed(
        &self,
        job: &InferenceJob,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ProcessOutcome, PipelineError> {
        let topology = Topology::for_devices(job.device_count);
        info!(
            "Starting multi-device inference for job {} ({} devices, tp={}, ep={})",
            job.job_id, job.device_count, topology.tp_size, topology.ep_size
        );

        let request = self.commands.distributed(job, topology);
        let outcome = self.runner.run(request, sink).await?;

        if outcome.success() {
            Ok(outcome)
        } else {
            Err(PipelineError::InferenceFailed {
                mode: ExecutionMode::Distributed,
                reason: outcome.failure_reason(self.commands.timeout()),
                tail: outcome.tail(DISTRIBUTED_ERROR_TAIL),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::error::RunnerError;
    use crate::execution::ExecutionRequest;
    use crate::progress::NoopProgressSink;
    use async_trait::async_trait;
    use atelier_core::domain::request::GenerationRequest;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Runner that replays scripted outcomes and records every request
    struct ScriptedRunner {
        outcomes: Mutex<VecDeque<Result<ProcessOutcome, RunnerError>>>,
        calls: Mutex<Vec<ExecutionRequest>>,
    }

    impl ScriptedRunner {
        fn new(outcomes: Vec<Result<ProcessOutcome, RunnerError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<ExecutionRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceRunner for ScriptedRunner {
        async fn run(
            &self,
            request: ExecutionRequest,
            _sink: Arc<dyn ProgressSink>,
        ) -> Result<ProcessOutcome, RunnerError> {
            self.calls.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected runner invocation")
        }
    }

    fn exited(code: i32, lines: &[&str]) -> Result<ProcessOutcome, RunnerError> {
        Ok(ProcessOutcome {
            exit_code: Some(code),
            output: lines.iter().map(|l| l.to_string()).collect(),
            timed_out: false,
        })
    }

    fn job(device_count: u32) -> InferenceJob {
        let mut request = GenerationRequest::new("p");
        request.resolution = "1536x1536".to_string();
        request.num_inference_steps = 28;
        request.num_images_per_prompt = 2;

        InferenceJob {
            job_id: "img_job".to_string(),
            resolution: request.parsed_resolution().unwrap(),
            request,
            device_count,
            output_dir: PathBuf::from("/out/img_job"),
            prompt_file: PathBuf::from("/out/img_job/img_job_prompt.txt"),
        }
    }

    fn supervisor(runner: Arc<ScriptedRunner>) -> FallbackSupervisor {
        let commands = CommandBuilder::new(&RunnerConfig::default(), "/opt/hidream");
        FallbackSupervisor::new(runner, commands)
    }

    fn arg_after<'a>(request: &'a ExecutionRequest, flag: &str) -> Option<&'a str> {
        let i = request.args.iter().position(|a| a == flag)?;
        request.args.get(i + 1).map(String::as_str)
    }

    #[tokio::test]
    async fn test_single_device_runs_once() {
        let runner = ScriptedRunner::new(vec![exited(0, &["done"])]);
        let run = supervisor(runner.clone())
            .execute(&job(1), Arc::new(NoopProgressSink))
            .await
            .unwrap();

        assert_eq!(run.mode, ExecutionMode::SingleDevice);
        assert!(!run.fell_back);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "python3");
    }

    #[tokio::test]
    async fn test_distributed_success_does_not_fall_back() {
        let runner = ScriptedRunner::new(vec![exited(0, &[])]);
        let run = supervisor(runner.clone())
            .execute(&job(8), Arc::new(NoopProgressSink))
            .await
            .unwrap();

        assert_eq!(run.mode, ExecutionMode::Distributed);
        assert!(!run.fell_back);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "torchrun");
        assert_eq!(arg_after(&calls[0], "--tp_size"), Some("4"));
        assert_eq!(arg_after(&calls[0], "--ep_size"), Some("2"));
    }

    #[tokio::test]
    async fn test_distributed_failure_falls_back_with_original_parameters() {
        let runner = ScriptedRunner::new(vec![
            exited(1, &["HCCL timeout"]),
            exited(0, &["step 1"]),
        ]);
        let run = supervisor(runner.clone())
            .execute(&job(8), Arc::new(NoopProgressSink))
            .await
            .unwrap();

        assert_eq!(run.mode, ExecutionMode::SingleDevice);
        assert!(run.fell_back);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "torchrun");

        let retry = &calls[1];
        assert_eq!(retry.program, "python3");
        assert_eq!(arg_after(retry, "--device_id"), Some("0"));
        assert_eq!(arg_after(retry, "--resolution"), Some("1536x1536"));
        assert_eq!(arg_after(retry, "--num_inference_steps"), Some("28"));
        assert_eq!(arg_after(retry, "--num_images_per_prompt"), Some("2"));
        assert_eq!(arg_after(retry, "--save_dir"), Some("/out/img_job"));
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_fallback_error() {
        let runner = ScriptedRunner::new(vec![
            exited(1, &["distributed-only failure"]),
            exited(2, &["single device out of memory"]),
        ]);
        let err = supervisor(runner.clone())
            .execute(&job(4), Arc::new(NoopProgressSink))
            .await
            .unwrap_err();

        match &err {
            PipelineError::InferenceFailed { mode, reason, tail } => {
                assert_eq!(*mode, ExecutionMode::SingleDevice);
                assert_eq!(reason, "failed with code 2");
                assert!(tail.contains("out of memory"));
                assert!(!tail.contains("distributed-only"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_single_device_failure_is_not_retried() {
        let runner = ScriptedRunner::new(vec![exited(1, &["boom"])]);
        let err = supervisor(runner.clone())
            .execute(&job(1), Arc::new(NoopProgressSink))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("single-device inference failed with code 1"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_distributed_launch_failure_falls_back() {
        let runner = ScriptedRunner::new(vec![
            Err(RunnerError::Launch {
                program: "torchrun".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            exited(0, &[]),
        ]);
        let run = supervisor(runner.clone())
            .execute(&job(2), Arc::new(NoopProgressSink))
            .await
            .unwrap();

        assert!(run.fell_back);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_distributed_timeout_falls_back() {
        let runner = ScriptedRunner::new(vec![
            Ok(ProcessOutcome {
                exit_code: None,
                output: vec!["sampling step 3".to_string()],
                timed_out: true,
            }),
            exited(0, &["done"]),
        ]);
        let run = supervisor(runner.clone())
            .execute(&job(8), Arc::new(NoopProgressSink))
            .await
            .unwrap();

        assert_eq!(run.mode, ExecutionMode::SingleDevice);
        assert!(run.fell_back);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "torchrun");
        assert_eq!(calls[1].program, "python3");
        assert_eq!(calls[1].timeout, Some(std::time::Duration::from_secs(7200)));
    }

    #[tokio::test]
    async fn test_single_device_timeout_is_final() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutcome {
            exit_code: None,
            output: vec![],
            timed_out: true,
        })]);
        let err = supervisor(runner.clone())
            .execute(&job(1), Arc::new(NoopProgressSink))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("single-device inference timed out"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_single_device_error_tail_is_bounded() {
        let lines: Vec<String> = (0..40).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let runner = ScriptedRunner::new(vec![exited(1, &refs)]);

        let err = supervisor(runner)
            .execute(&job(1), Arc::new(NoopProgressSink))
            .await
            .unwrap_err();

        match err {
            PipelineError::InferenceFailed { tail, .. } => {
                assert_eq!(tail.lines().count(), SINGLE_ERROR_TAIL);
                assert!(tail.ends_with("line 39"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
