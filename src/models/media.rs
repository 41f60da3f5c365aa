//! Media attachment entity
//!
//! <https://docs.joinmastodon.org/entities/MediaAttachment/>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Entity;

/// An uploaded file attached (or attachable) to a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Attachment ID, passed as `media_ids[]` when posting
    pub id: String,
    /// Kind of media
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Full-size URL; `None` while the instance is still processing it
    #[serde(default)]
    pub url: Option<String>,
    /// Thumbnail URL
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Original URL on the remote instance
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Dimensions, duration, focus point
    #[serde(default)]
    pub meta: Option<Value>,
    /// Alt text
    #[serde(default)]
    pub description: Option<String>,
    /// Blurhash placeholder
    #[serde(default)]
    pub blurhash: Option<String>,
}

impl Entity for MediaAttachment {
    const KIND: &'static str = "MediaAttachment";
}

impl MediaAttachment {
    /// Whether the instance has finished processing the upload
    pub const fn is_processed(&self) -> bool {
        self.url.is_some()
    }
}

/// Media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Image (JPEG, PNG, GIF, WebP)
    Image,
    /// Video (MP4, WebM)
    Video,
    /// Looping soundless video
    Gifv,
    /// Audio file
    Audio,
    /// Anything this client does not know about yet
    #[serde(other)]
    Unknown,
}
