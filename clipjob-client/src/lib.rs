//! Clipjob Provider Client
//!
//! A small, type-safe HTTP client for a Replicate-style prediction API.
//!
//! The client covers the whole remote side of a job: creating a prediction,
//! checking its status, cancelling it and streaming the finished artifact.
//! Everything the orchestrator needs is exposed through the [`JobProvider`]
//! trait so that tests can swap the network for a scripted fake.
//!
//! # Example
//!
//! ```no_run
//! use clipjob_client::{JobProvider, ProviderClient};
//! use serde_json::json;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ProviderClient::new("https://api.replicate.com/v1", "r8_token");
//!
//!     let input = json!({ "prompt": "a red fox in the snow" });
//!     let submission = client
//!         .submit("wan-video/wan-2.2-t2v-fast", input.as_object().unwrap())
//!         .await?;
//!
//!     let outcome = client
//!         .wait_until_done(&submission.remote_id, Duration::from_secs(30), &CancellationToken::new())
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

mod download;
pub mod error;
pub mod prediction;
mod predictions;
pub mod provider;
pub mod wait;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use prediction::{Prediction, Submission, extract_error_message};
pub use provider::JobProvider;
pub use wait::{DEFAULT_POLL_INTERVAL, wait_until_done};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default provider API root
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// HTTP client for the provider's prediction API
#[derive(Clone)]
pub struct ProviderClient {
    /// Base URL of the API (e.g., "https://api.replicate.com/v1")
    base_url: String,
    /// Bearer token sent with every API call
    api_token: String,
    /// HTTP client instance
    client: Client,
    /// Pause between status checks while waiting
    poll_interval: Duration,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url)
            .field("api_token", &"***")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ProviderClient {
    /// Create a new provider client
    ///
    /// # Arguments
    /// * `base_url` - The API root (e.g., "https://api.replicate.com/v1")
    /// * `api_token` - Token sent as `Authorization: Bearer <token>`
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self::with_client(base_url, api_token, Client::new())
    }

    /// Create a new provider client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use clipjob_client::ProviderClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ProviderClient::with_client("https://api.replicate.com/v1", "token", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the pause between status checks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Get the base URL of the provider API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach the bearer token to an API request
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Read a response body as text, never failing
    async fn body_text(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string())
    }

    /// Deserialize a successful response body
    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse JSON response: {}", e)))
    }
}
