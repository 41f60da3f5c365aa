//! Scheduled status entity
//!
//! <https://docs.joinmastodon.org/entities/ScheduledStatus/>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, MediaAttachment, Visibility};

/// A status waiting on the instance to be published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStatus {
    /// Scheduled status ID (not the ID the status will get)
    pub id: String,
    /// When the instance will publish it
    pub scheduled_at: DateTime<Utc>,
    /// Parameters the status will be created with
    pub params: ScheduledParams,
    /// Media that will be attached
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
}

impl Entity for ScheduledStatus {
    const KIND: &'static str = "ScheduledStatus";
}

impl ScheduledStatus {
    /// Whether the publication time has already passed
    pub fn is_due(&self) -> bool {
        Utc::now() >= self.scheduled_at
    }
}

/// Creation parameters stored with a scheduled status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledParams {
    /// Status body
    #[serde(default)]
    pub text: String,
    /// Visibility it will be posted with
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Attached media IDs
    #[serde(default)]
    pub media_ids: Option<Vec<String>>,
    /// Reply target
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    /// Content warning
    #[serde(default)]
    pub spoiler_text: Option<String>,
    /// Sensitive media flag
    #[serde(default)]
    pub sensitive: Option<bool>,
    /// Language code
    #[serde(default)]
    pub language: Option<String>,
}
