//! Atelier HTTP Client
//!
//! A simple, type-safe HTTP client for the Atelier image generation API.
//!
//! # Example
//!
//! ```no_run
//! use atelier_client::AtelierClient;
//! use atelier_core::domain::request::GenerationRequest;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AtelierClient::new("http://localhost:8088");
//!
//!     let submitted = client.submit(&GenerationRequest::new("a red fox")).await?;
//!     let status = client
//!         .wait_for_completion(
//!             &submitted.request_id,
//!             Duration::from_secs(5),
//!             Duration::from_secs(600),
//!             |s| println!("{}%", s.progress),
//!         )
//!         .await?;
//!
//!     println!("Result: {:?}", status.result_urls);
//!     Ok(())
//! }
//! ```

pub mod error;
mod health;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Atelier API
///
/// Methods are organized into logical groups:
/// - Submission (single and batch)
/// - Status polling and image download
/// - Service info and health
#[derive(Debug, Clone)]
pub struct AtelierClient {
    /// Base URL of the server (e.g., "http://localhost:8088")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl AtelierClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use atelier_client::AtelierClient;
    ///
    /// let client = AtelierClient::new("http://localhost:8088");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the raw body
    async fn handle_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AtelierClient::new("http://localhost:8088");
        assert_eq!(client.base_url(), "http://localhost:8088");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = AtelierClient::new("http://localhost:8088/");
        assert_eq!(client.base_url(), "http://localhost:8088");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = AtelierClient::with_client("http://localhost:8088", http_client);
        assert_eq!(client.base_url(), "http://localhost:8088");
    }
}
