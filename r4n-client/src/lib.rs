//! Eurocore HTTP Client
//!
//! A small, type-safe HTTP client for the eurocore content API.
//!
//! The bot uses it to authenticate users, queue dispatch and RMB post jobs
//! on their behalf, and poll those jobs until they finish.
//!
//! # Example
//!
//! ```no_run
//! use r4n_client::EurocoreClient;
//! use r4n_core::dto::user::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), r4n_client::ClientError> {
//!     let client = EurocoreClient::new("https://api.europeia.dev");
//!
//!     let token = client.login(&Credentials::new("testlandia", "hunter22")).await?;
//!
//!     println!("Logged in with token of length {}", token.len());
//!     Ok(())
//! }
//! ```

mod content;
pub mod error;
mod jobs;
mod users;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use r4n_core::dto::job::{JobStatusPayload, Submission, SubmittedJob};

use reqwest::Client;
use reqwest::header::LOCATION;
use serde::de::DeserializeOwned;

/// HTTP client for the eurocore API
///
/// Methods are organized into logical groups:
/// - User authentication (login, register)
/// - Content submission (dispatches, RMB posts)
/// - Job status lookups
#[derive(Debug, Clone)]
pub struct EurocoreClient {
    /// Base URL of eurocore (e.g., "https://api.europeia.dev")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl EurocoreClient {
    /// Create a new eurocore client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the eurocore API
    ///
    /// # Example
    /// ```
    /// use r4n_client::EurocoreClient;
    ///
    /// let client = EurocoreClient::new("https://api.europeia.dev");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new eurocore client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use r4n_client::EurocoreClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = EurocoreClient::with_client("https://api.europeia.dev", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the eurocore API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and turn failures into `ApiError`
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

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle a job submission: JSON body plus the `Location` to poll
    async fn handle_submission(&self, response: reqwest::Response) -> Result<Submission> {
        let response = Self::check_status(response).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(ClientError::MissingLocation)?;

        let job = response
            .json::<SubmittedJob>()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse submitted job: {}", e)))?;

        tracing::debug!("Job {} queued at {}", job.id, location);

        Ok(Submission { job, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EurocoreClient::new("https://api.europeia.dev");
        assert_eq!(client.base_url(), "https://api.europeia.dev");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = EurocoreClient::new("https://api.europeia.dev/");
        assert_eq!(client.base_url(), "https://api.europeia.dev");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = EurocoreClient::with_client("https://api.europeia.dev", http_client);
        assert_eq!(client.base_url(), "https://api.europeia.dev");
    }

    #[test]
    fn test_url_joins_locations() {
        let client = EurocoreClient::new("https://api.europeia.dev/");
        assert_eq!(
            client.url("/queue/dispatch/42"),
            "https://api.europeia.dev/queue/dispatch/42"
        );
        assert_eq!(client.url("login"), "https://api.europeia.dev/login");
    }
}
