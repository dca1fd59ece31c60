//! Execution types for the Atelier runner
//!
//! These types only exist at runtime while one inference process runs.
//! They are not persisted or sent over the network.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::progress::RUNNER_START_PROGRESS;

/// Everything needed to launch one inference process
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    /// Executable to launch (resolved through PATH when not absolute)
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Directory the process runs in
    pub working_dir: PathBuf,
    /// Progress value the run starts from
    pub initial_progress: u8,
    /// Kill the process if it runs longer than this
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: working_dir.into(),
            initial_progress: RUNNER_START_PROGRESS,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line for log messages, truncated after `max_args` arguments
    pub fn display_command(&self, max_args: usize) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().take(max_args).cloned());
        if self.args.len() > max_args {
            parts.push("...".to_string());
        }
        parts.join(" ")
    }
}

/// How a finished inference process ended
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when killed by a signal or the timeout
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr lines, in arrival order
    pub output: Vec<String>,
    pub timed_out: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// The last `lines` output lines joined with newlines
    pub fn tail(&self, lines: usize) -> String {
        let start = self.output.len().saturating_sub(lines);
        self.output[start..].join("\n")
    }

    /// Short description of why the run did not succeed
    pub fn failure_reason(&self, timeout: Option<Duration>) -> String {
        if self.timed_out {
            return match timeout {
                Some(limit) => format!("timed out after {}s", limit.as_secs()),
                None => "timed out".to_string(),
            };
        }

        match self.exit_code {
            Some(code) => format!("failed with code {}", code),
            None => "was terminated by a signal".to_string(),
        }
    }
}
