//! Wire models for the uploader agent API.

use crate::content_store::{Content, Platform, PostType};
use serde::{Deserialize, Serialize};

/// Body of `POST /publish` sent to the uploader agent.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    /// Ordered file paths. A single element for everything but albums.
    pub file_paths: Vec<String>,
    /// Caption text. Absent for stories, which carry no caption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub post_type: PostType,
    pub platform: Platform,
}

impl PublishRequest {
    /// Build the request for one content item. The mapping from post type to
    /// payload shape is exhaustive so a new post type cannot be forgotten.
    pub fn for_content(content: &Content, platform: Platform) -> Self {
        let paths = content.file_paths();
        let (file_paths, caption) = match content.post_type {
            PostType::Photo | PostType::Video | PostType::Reel => (
                paths.into_iter().take(1).collect(),
                Some(content.caption.clone()),
            ),
            PostType::Album => (paths, Some(content.caption.clone())),
            PostType::Story => (paths.into_iter().take(1).collect(), None),
        };
        Self {
            file_paths,
            caption,
            post_type: content.post_type,
            platform,
        }
    }
}

/// Body of the uploader agent's reply.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
