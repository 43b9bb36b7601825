//! HTTP client for the external uploader agent.

use super::models::{PublishRequest, PublishResponse};
use super::{DispatchError, UploadDispatcher};
use crate::content_store::{Content, Platform};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Forwards publish requests to the uploader agent, the sibling process that
/// owns platform credentials and performs the actual uploads.
pub struct HttpUploadDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadDispatcher {
    /// Create a new dispatcher.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the uploader agent (e.g., "http://localhost:9100")
    /// * `timeout_secs` - Request timeout in seconds; uploads can take minutes
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    /// Check if the uploader agent is reachable.
    pub async fn health_check(&self) -> Result<(), DispatchError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DispatchError::Http(format!(
                "health check failed with status {}",
                response.status()
            )))
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl UploadDispatcher for HttpUploadDispatcher {
    async fn publish(&self, content: &Content, platform: Platform) -> Result<(), DispatchError> {
        let request = PublishRequest::for_content(content, platform);
        let url = format!("{}/publish", self.base_url);
        debug!(
            "Publishing {} {} file(s) to {} via {}",
            request.file_paths.len(),
            content.post_type.as_str(),
            platform.as_str(),
            url
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Http(format!("status {}: {}", status, body)));
        }

        let reply: PublishResponse = response.json().await?;
        if reply.success {
            Ok(())
        } else {
            Err(DispatchError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| "upload rejected without a reason".to_string()),
            ))
        }
    }
}
