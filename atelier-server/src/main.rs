//! Atelier Server
//!
//! HTTP gateway and job worker for image generation.
//!
//! Architecture:
//! - Configuration: load settings from environment or defaults
//! - Repositories: in-memory job store and FIFO job queue
//! - Services: submission, status and health logic
//! - Scheduler: single worker draining the queue through the pipeline
//! - API: axum routes, plus static serving of generated images

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod state;

use crate::config::Config;
use crate::repository::{JobStore, job_queue};
use crate::scheduler::JobWorker;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_server=info,atelier_runner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atelier Server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    tracing::info!(
        "Loaded configuration: bind_addr={}, api_base_url={}, devices={}",
        config.bind_addr,
        config.api_base_url,
        config.runner.device_count
    );

    // A missing backend keeps the API up; submissions are refused until restart
    let pipeline = match atelier_runner::create_pipeline(config.runner.clone()) {
        Ok(pipeline) => Some(pipeline),
        Err(e) => {
            tracing::error!("Failed to initialize pipeline: {}", e);
            None
        }
    };

    let images_dir = match &pipeline {
        Some(pipeline) => pipeline.output_root().to_path_buf(),
        None => config.runner.output_dir.clone(),
    };

    let store = Arc::new(JobStore::new());
    let (queue, receiver) = job_queue();

    if let Some(pipeline) = &pipeline {
        let worker = JobWorker::new(
            store.clone(),
            receiver,
            pipeline.clone(),
            config.api_base_url.clone(),
        )
        .with_intervals(config.idle_interval, config.error_backoff);
        tokio::spawn(worker.run());
        tracing::info!("Job worker started");
    }

    let state = AppState {
        store,
        queue,
        pipeline,
        images_dir,
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
