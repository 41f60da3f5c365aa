//! Status ("toot") entity and its embedded types
//!
//! <https://docs.joinmastodon.org/entities/Status/>

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::{Account, CustomEmoji, Entity, MediaAttachment};

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// A post, toot, or status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Instance-local status ID
    pub id: String,
    /// When the status was created
    pub created_at: DateTime<Utc>,
    /// Author
    pub account: Account,
    /// Who can see it
    pub visibility: Visibility,
    /// Body (HTML)
    #[serde(default)]
    pub content: String,
    /// ActivityPub URI
    #[serde(default)]
    pub uri: String,
    /// Web URL
    #[serde(default)]
    pub url: Option<String>,
    /// Whether media is marked sensitive
    #[serde(default)]
    pub sensitive: bool,
    /// Content warning
    #[serde(default)]
    pub spoiler_text: String,
    /// Attached media, in display order
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    /// Posting application, when disclosed
    #[serde(default)]
    pub application: Option<Application>,
    /// Mentioned accounts
    #[serde(default)]
    pub mentions: Vec<Mention>,
    /// Hashtags used
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Custom emoji used in the body
    #[serde(default)]
    pub emojis: Vec<CustomEmoji>,
    /// Number of boosts
    #[serde(default)]
    pub reblogs_count: u64,
    /// Number of favourites
    #[serde(default)]
    pub favourites_count: u64,
    /// Number of replies
    #[serde(default)]
    pub replies_count: u64,
    /// Parent status ID
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    /// Parent status author ID
    #[serde(default)]
    pub in_reply_to_account_id: Option<String>,
    /// Boosted status, if this is a boost
    #[serde(default)]
    pub reblog: Option<Box<Status>>,
    /// Attached poll
    #[serde(default)]
    pub poll: Option<Poll>,
    /// Link preview
    #[serde(default)]
    pub card: Option<PreviewCard>,
    /// ISO 639 language code
    #[serde(default)]
    pub language: Option<String>,
    /// Plain source text; only returned by delete and source endpoints
    #[serde(default)]
    pub text: Option<String>,
    /// Last edit time
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    /// Publication time for statuses created from a schedule
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Whether the authenticated user favourited it
    #[serde(default)]
    pub favourited: Option<bool>,
    /// Whether the authenticated user boosted it
    #[serde(default)]
    pub reblogged: Option<bool>,
}

impl Entity for Status {
    const KIND: &'static str = "Status";
}

impl Status {
    /// ID of the author account
    pub fn author_id(&self) -> &str {
        &self.account.id
    }

    /// Body with HTML stripped
    ///
    /// Tags go first, entities are decoded last, so escaped text such as
    /// `&lt;u8&gt;` survives as `<u8>`.
    pub fn plain_text(&self) -> String {
        let content = self
            .content
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("</p><p>", "\n\n");

        let stripped = match &*HTML_TAG {
            Some(re) => re.replace_all(&content, "").into_owned(),
            None => content,
        };
        html_escape::decode_html_entities(&stripped).into_owned()
    }
}

/// Status visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Everyone, shown in public timelines
    #[default]
    Public,
    /// Everyone, hidden from public timelines
    Unlisted,
    /// Followers only
    Private,
    /// Mentioned accounts only
    Direct,
    /// A visibility this client does not know about yet
    #[serde(other)]
    Unknown,
}

impl Visibility {
    /// Wire value
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mentioned account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Account ID
    pub id: String,
    /// Username
    pub username: String,
    /// Profile URL
    pub url: String,
    /// Webfinger account URI
    pub acct: String,
}

/// A hashtag used in a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name without `#`
    pub name: String,
    /// Tag timeline URL
    pub url: String,
}

/// The application a status was posted from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Application name
    pub name: String,
    /// Application homepage
    #[serde(default)]
    pub website: Option<String>,
}

/// A poll attached to a status
///
/// <https://docs.joinmastodon.org/entities/Poll/>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Poll ID
    pub id: String,
    /// When voting closes
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether voting has closed
    #[serde(default)]
    pub expired: bool,
    /// Whether several options may be chosen
    #[serde(default)]
    pub multiple: bool,
    /// Total votes
    #[serde(default)]
    pub votes_count: u64,
    /// Distinct voters (multiple-choice polls)
    #[serde(default)]
    pub voters_count: Option<u64>,
    /// Choices
    #[serde(default)]
    pub options: Vec<PollOption>,
    /// Whether the authenticated user voted
    #[serde(default)]
    pub voted: Option<bool>,
    /// Option indices the authenticated user chose
    #[serde(default)]
    pub own_votes: Option<Vec<u32>>,
}

/// A poll choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option text
    pub title: String,
    /// Votes so far; hidden until the poll ends on some instances
    #[serde(default)]
    pub votes_count: Option<u64>,
}

/// Rich preview generated from a link's `OpenGraph` tags
///
/// <https://docs.joinmastodon.org/entities/PreviewCard/>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCard {
    /// Linked URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Page description
    #[serde(default)]
    pub description: String,
    /// Preview kind
    #[serde(rename = "type", default)]
    pub card_type: PreviewType,
    /// Author of the linked page
    #[serde(default)]
    pub author_name: String,
    /// Author URL
    #[serde(default)]
    pub author_url: String,
    /// Site name
    #[serde(default)]
    pub provider_name: String,
    /// Site URL
    #[serde(default)]
    pub provider_url: String,
    /// Preview image
    #[serde(default)]
    pub image: Option<String>,
    /// Embeddable player URL
    #[serde(default)]
    pub embed_url: String,
    /// Image width
    #[serde(default)]
    pub width: u32,
    /// Image height
    #[serde(default)]
    pub height: u32,
    /// Blurhash placeholder
    #[serde(default)]
    pub blurhash: Option<String>,
}

/// Preview card type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewType {
    /// Plain link
    #[default]
    Link,
    /// Image
    Photo,
    /// Video
    Video,
    /// iframe embed
    Rich,
    /// A card type this client does not know about yet
    #[serde(other)]
    Unknown,
}
