//! The upload dispatch boundary.
//!
//! The scheduler core publishes through the `UploadDispatcher` trait and
//! never sees platform credentials or upload mechanics. The production
//! implementation forwards publish requests to the external uploader agent
//! over HTTP.

mod http;
mod models;

pub use http::HttpUploadDispatcher;
pub use models::{PublishRequest, PublishResponse};

use crate::content_store::{Content, Platform};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("upload request timed out")]
    Timeout,

    #[error("uploader agent request failed: {0}")]
    Http(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout
        } else {
            DispatchError::Http(e.to_string())
        }
    }
}

/// Performs the platform-specific publish action for one content item.
///
/// `Ok(())` means the platform accepted the post; every failure carries the
/// reason. Implementations must report failures through the return value
/// rather than panicking, since the executor treats any `Err` as a failed
/// firing.
#[async_trait]
pub trait UploadDispatcher: Send + Sync {
    async fn publish(&self, content: &Content, platform: Platform) -> Result<(), DispatchError>;
}
