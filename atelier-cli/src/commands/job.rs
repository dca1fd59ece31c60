//! Job command handlers
//!
//! Handles submission, status, waiting and image download.

use anyhow::{Context, Result};
use atelier_client::AtelierClient;
use atelier_core::domain::job::JobStatus;
use atelier_core::domain::request::{GenerationRequest, InferMode};
use atelier_core::dto::job::{BatchRequest, JobStatusResponse, SubmitResponse};
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments of the `submit` command
#[derive(Args)]
pub struct SubmitArgs {
    /// Text prompt
    pub prompt: String,

    /// Things the image should avoid
    #[arg(long, default_value = "")]
    pub negative_prompt: String,

    /// Output size as WIDTHxHEIGHT
    #[arg(short, long, default_value = "1024x1024")]
    pub resolution: String,

    /// Number of denoising steps
    #[arg(short, long, default_value_t = 50)]
    pub steps: u32,

    /// Classifier-free guidance scale
    #[arg(short, long, default_value_t = 7.5)]
    pub guidance_scale: f64,

    /// Images to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub images: u32,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 1)]
    pub batch_size: u32,

    /// Accuracy, Performance or Profiling
    #[arg(long, default_value = "Accuracy")]
    pub infer_type: InferMode,

    /// Devices to use (overrides the server default)
    #[arg(long)]
    pub devices: Option<u32>,

    /// Wait for the job to finish
    #[arg(short, long)]
    pub wait: bool,
}

impl SubmitArgs {
    fn into_request(self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            resolution: self.resolution,
            num_inference_steps: self.steps,
            guidance_scale: self.guidance_scale,
            num_images_per_prompt: self.images,
            seed: self.seed,
            batch_size: self.batch_size,
            infer_type: self.infer_type,
            device_count: self.devices,
        }
    }
}

/// Submit one request, optionally waiting for the result
pub async fn submit(client: &AtelierClient, args: SubmitArgs) -> Result<()> {
    let wait_for_result = args.wait;
    let request = args.into_request();

    let response = client.submit(&request).await?;
    print_submitted(&response);

    if wait_for_result {
        println!();
        let status = wait(client, &response.request_id, 5, 3600).await?;
        if status.status == JobStatus::Failed {
            anyhow::bail!("job {} failed", status.request_id);
        }
    }

    Ok(())
}

/// Submit every request of a JSON file
pub async fn batch(client: &AtelierClient, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let requests = parse_batch(&contents)
        .with_context(|| format!("Invalid batch file {}", file.display()))?;

    let responses = client.batch_submit(requests).await?;

    println!("{}", format!("Submitted {} job(s):", responses.len()).bold());
    println!();
    for response in &responses {
        print_submitted(response);
        println!();
    }

    Ok(())
}

/// Show the status of a job
pub async fn status(client: &AtelierClient, id: &str) -> Result<()> {
    let status = client.get_status(id).await?;
    print_status(&status);
    Ok(())
}

/// Poll a job until it is terminal, printing progress changes
pub async fn wait(
    client: &AtelierClient,
    id: &str,
    interval_secs: u64,
    timeout_secs: u64,
) -> Result<JobStatusResponse> {
    println!("{}", format!("Waiting for job {}...", id).dimmed());

    let mut last: Option<(JobStatus, u8)> = None;
    let status = client
        .wait_for_completion(
            id,
            Duration::from_secs(interval_secs.max(1)),
            Duration::from_secs(timeout_secs),
            |s| {
                if last != Some((s.status, s.progress)) {
                    println!("  {} {:>3}%", colorize_status(s.status), s.progress);
                    last = Some((s.status, s.progress));
                }
            },
        )
        .await?;

    println!();
    print_status(&status);
    Ok(status)
}

/// Download one image of a completed job
pub async fn download(
    client: &AtelierClient,
    id: &str,
    index: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = client.download(id, index).await?;
    let output = output.unwrap_or_else(|| default_download_path(id, index));

    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Saved {} ({} bytes)",
        "✓".green(),
        output.display().to_string().cyan(),
        bytes.len()
    );
    Ok(())
}

/// Accepts either `{"requests": [...]}` or a bare array
fn parse_batch(contents: &str) -> Result<Vec<GenerationRequest>> {
    if let Ok(batch) = serde_json::from_str::<BatchRequest>(contents) {
        return Ok(batch.requests);
    }

    let requests: Vec<GenerationRequest> = serde_json::from_str(contents)?;
    Ok(requests)
}

fn default_download_path(id: &str, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_image_{}.png", id, index))
}

fn print_submitted(response: &SubmitResponse) {
    println!("{} Job {}", "▸".cyan(), response.request_id.cyan());
    println!("    Status:    {}", colorize_status(response.status));
    println!("    Estimated: ~{}s", response.estimated_time);
    println!("    {}", response.message.dimmed());
}

/// Print detailed job information
fn print_status(status: &JobStatusResponse) {
    println!("{}", "Job Details:".bold());
    println!("  ID:         {}", status.request_id.cyan());
    println!("  Status:     {}", colorize_status(status.status));
    println!("  Progress:   {}%", status.progress);
    println!(
        "  Created:    {}",
        status.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(completed) = status.completed_at {
        println!("  Completed:  {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(seconds) = status.processing_time {
        println!("  Duration:   {:.1}s", seconds);
    }

    if !status.result_urls.is_empty() {
        println!("\n{}", "Images:".bold());
        for (index, url) in status.result_urls.iter().enumerate() {
            println!("  [{}] {}", index, url);
        }
    }

    if !status.error.is_empty() {
        println!("\n{}", "Error:".bold());
        println!("{}", status.error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
