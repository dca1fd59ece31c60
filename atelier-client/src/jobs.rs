//! Job-related API endpoints

use crate::AtelierClient;
use crate::error::{ClientError, Result};
use atelier_core::domain::request::GenerationRequest;
use atelier_core::dto::job::{BatchRequest, JobStatusResponse, SubmitResponse};
use std::time::{Duration, Instant};

impl AtelierClient {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit one image generation request
    ///
    /// # Example
    /// ```no_run
    /// # use atelier_client::AtelierClient;
    /// # use atelier_core::domain::request::GenerationRequest;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = AtelierClient::new("http://localhost:8088");
    /// let submitted = client.submit(&GenerationRequest::new("a lighthouse at dusk")).await?;
    /// println!("queued as {}", submitted.request_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(&self, req: &GenerationRequest) -> Result<SubmitResponse> {
        let url = format!("{}/submit", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Submit several requests at once
    ///
    /// The server validates the whole batch before creating any job.
    pub async fn batch_submit(&self, requests: Vec<GenerationRequest>) -> Result<Vec<SubmitResponse>> {
        let url = format!("{}/batch_submit", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&BatchRequest { requests })
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Status and Results
    // =============================================================================

    /// Get the current state of a job
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let url = format!("{}/status/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it completes or fails
    ///
    /// `on_update` sees every polled status, including the final one.
    pub async fn wait_for_completion<F>(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
        mut on_update: F,
    ) -> Result<JobStatusResponse>
    where
        F: FnMut(&JobStatusResponse),
    {
        let started = Instant::now();

        loop {
            let status = self.get_status(job_id).await?;
            on_update(&status);

            if status.status.is_terminal() {
                return Ok(status);
            }

            if started.elapsed() >= timeout {
                return Err(ClientError::Timeout(timeout, job_id.to_string()));
            }

            tracing::debug!("Job {} at {}%, polling again", job_id, status.progress);
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Download one generated image of a completed job
    pub async fn download(&self, job_id: &str, image_index: usize) -> Result<Vec<u8>> {
        let url = format!("{}/download/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .query(&[("image_index", image_index)])
            .send()
            .await?;

        self.handle_bytes(response).await
    }
}
