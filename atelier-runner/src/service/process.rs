//! Inference process runner
//!
//! Launches one external process, streams its combined output line by line,
//! infers progress from that output and reports how the process ended.
//! Retry policy is not handled here; see the fallback supervisor.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::execution::{ExecutionRequest, ProcessOutcome};
use crate::progress::{KeywordProgressParser, ParserFactory, ProgressParser, ProgressSink};

/// Runs one inference process to completion
#[async_trait]
pub trait InferenceRunner: Send + Sync {
    /// Launches the process described by `request`
    ///
    /// Progress inferred from the output is forwarded to `sink`, never below
    /// `request.initial_progress`. A non-zero exit is reported through the
    /// outcome, not as an error; errors mean the process could not be run.
    async fn run(
        &self,
        request: ExecutionRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ProcessOutcome, RunnerError>;
}

/// Runner backed by `tokio::process`
pub struct ProcessRunner {
    parser_factory: ParserFactory,
}

impl ProcessRunner {
    /// Creates a runner using the keyword progress heuristic
    pub fn new() -> Self {
        Self::with_parser(KeywordProgressParser::factory())
    }

    /// Creates a runner with a custom progress parser
    pub fn with_parser(parser_factory: ParserFactory) -> Self {
        Self { parser_factory }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceRunner for ProcessRunner {
    async fn run(
        &self,
        request: ExecutionRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ProcessOutcome, RunnerError> {
        info!(
            "Executing: {} (in {})",
            request.display_command(8),
            request.working_dir.display()
        );

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .envs(&request.env)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // torchrun forks one worker per device; they share the launcher's group
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            program: request.program.clone(),
            source,
        })?;
        let mut group = ProcessGroup { pgid: child.id() };

        let stdout = child.stdout.take().ok_or(RunnerError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(RunnerError::MissingPipe("stderr"))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(stdout, tx.clone());
        forward_lines(stderr, tx);

        let mut capture = OutputCapture {
            parser: (self.parser_factory)(request.initial_progress),
            sink,
            lines: Vec::new(),
        };

        let exited = async {
            loop {
                tokio::select! {
                    Some(line) = rx.recv() => capture.push(line),
                    status = child.wait() => break status,
                }
            }
        };

        let status = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, exited).await.ok(),
            None => Some(exited.await),
        };

        let timed_out = status.is_none();
        if timed_out {
            warn!(
                "Inference process exceeded {:?}, killing its process group",
                request.timeout.unwrap_or_default()
            );
        }

        // nothing the launcher started may outlive it
        group.kill();
        if timed_out {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill inference process: {}", e);
            }
        }

        // the pipes close once every writer is gone
        let drained = async {
            while let Some(line) = rx.recv().await {
                capture.push(line);
            }
        };
        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drained).await.is_err() {
            warn!("Inference output still open after the process ended, ignoring the rest");
        }

        let outcome = match status {
            Some(status) => ProcessOutcome {
                exit_code: status.map_err(RunnerError::Wait)?.code(),
                output: capture.lines,
                timed_out: false,
            },
            None => ProcessOutcome {
                exit_code: None,
                output: capture.lines,
                timed_out: true,
            },
        };

        info!(
            "Inference process finished: exit_code={:?}, lines={}, timed_out={}",
            outcome.exit_code,
            outcome.output.len(),
            outcome.timed_out
        );

        Ok(outcome)
    }
}

/// How long output is still read after the process has ended
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Output lines of one run, with the progress inferred from them
struct OutputCapture {
    parser: Box<dyn ProgressParser>,
    sink: Arc<dyn ProgressSink>,
    lines: Vec<String>,
}

impl OutputCapture {
    fn push(&mut self, line: String) {
        debug!("Inference: {}", line);
        if let Some(progress) = self.parser.observe(&line) {
            self.sink.report(progress);
        }
        self.lines.push(line);
    }
}

/// Process group led by a spawned inference process
///
/// Killed at the latest when dropped, so a cancelled run leaves no workers
/// behind on the devices.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };

    // SAFETY: killpg only sends a signal and takes no pointers.
    let ret = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: every member has already exited
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("Failed to kill process group {}: {}", pgid, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Streams trimmed, non-empty lines from `reader` into `tx`
///
/// Invalid UTF-8 is replaced rather than aborting the stream.
fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read inference output: {}", e);
                    break;
                }
            }
        }
    });
}
