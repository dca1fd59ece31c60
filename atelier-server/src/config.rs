//! Server configuration
//!
//! Defines the listen address, the public base URL used in result links,
//! worker loop timing and the runner settings passed to the pipeline.

use atelier_runner::RunnerConfig;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Public base URL prefixed to result links (e.g. "http://localhost:8088")
    pub api_base_url: String,

    /// How long the worker waits on an empty queue before re-checking
    pub idle_interval: Duration,

    /// Pause after a worker loop fault
    pub error_backoff: Duration,

    /// Inference pipeline settings
    pub runner: RunnerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8088".to_string(),
            api_base_url: "http://localhost:8088".to_string(),
            idle_interval: Duration::from_millis(1000),
            error_backoff: Duration::from_millis(5000),
            runner: RunnerConfig::default(),
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - ATELIER_BIND_ADDR (default: 0.0.0.0:8088)
    /// - API_BASE_URL (default: http://localhost:8088)
    /// - WORKER_IDLE_INTERVAL_MS (default: 1000)
    /// - WORKER_ERROR_BACKOFF_MS (default: 5000)
    /// - plus the runner variables (see `RunnerConfig::from_env`)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let idle_interval = std::env::var("WORKER_IDLE_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.idle_interval);

        let error_backoff = std::env::var("WORKER_ERROR_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.error_backoff);

        Ok(Self {
            bind_addr: std::env::var("ATELIER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_base_url: std::env::var("API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            idle_interval,
            error_backoff,
            runner: RunnerConfig::from_env()?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            anyhow::bail!("api_base_url must start with http:// or https://");
        }

        if self.idle_interval.is_zero() {
            anyhow::bail!("idle_interval must be greater than 0");
        }

        self.runner.validate()
    }
}
