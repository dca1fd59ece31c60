//! Service info and health endpoints

use crate::AtelierClient;
use crate::error::Result;
use atelier_core::dto::health::{HealthResponse, ServiceInfo};

impl AtelierClient {
    /// Get the service banner
    pub async fn service_info(&self) -> Result<ServiceInfo> {
        let url = format!("{}/", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get queue, job and device state
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
