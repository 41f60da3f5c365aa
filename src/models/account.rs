//! Account entity
//!
//! <https://docs.joinmastodon.org/entities/Account/>

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;

/// A user profile as seen by the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Instance-local account ID
    pub id: String,
    /// Username without the domain
    pub username: String,
    /// Webfinger account URI; `username` for local accounts
    pub acct: String,
    /// Profile URL
    pub url: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Whether follows must be approved
    #[serde(default)]
    pub locked: bool,
    /// Whether the account is automated
    #[serde(default)]
    pub bot: bool,
    /// Whether the account opted into discovery
    #[serde(default)]
    pub discoverable: Option<bool>,
    /// Whether the account is a group actor
    #[serde(default)]
    pub group: bool,
    /// When the account was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Bio (HTML)
    #[serde(default)]
    pub note: String,
    /// Avatar URL
    #[serde(default)]
    pub avatar: String,
    /// Non-animated avatar URL
    #[serde(default)]
    pub avatar_static: String,
    /// Header image URL
    #[serde(default)]
    pub header: String,
    /// Non-animated header URL
    #[serde(default)]
    pub header_static: String,
    /// Number of followers
    #[serde(default)]
    pub followers_count: u64,
    /// Number of followed accounts
    #[serde(default)]
    pub following_count: u64,
    /// Number of statuses
    #[serde(default)]
    pub statuses_count: u64,
    /// Day of the most recent status
    #[serde(default)]
    pub last_status_at: Option<NaiveDate>,
    /// Custom emoji used in the name and bio
    #[serde(default)]
    pub emojis: Vec<CustomEmoji>,
    /// Profile metadata fields
    #[serde(default)]
    pub fields: Vec<AccountField>,
}

impl Entity for Account {
    const KIND: &'static str = "Account";
}

impl Account {
    /// Full webfinger address, e.g. `@user@mastodon.social`
    pub fn at_username(&self) -> String {
        if self.acct.contains('@') {
            return format!("@{}", self.acct);
        }

        let domain = url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        match domain {
            Some(domain) => format!("@{}@{}", self.username, domain),
            None => format!("@{}", self.username),
        }
    }
}

/// A profile metadata field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountField {
    /// Label
    pub name: String,
    /// Value (HTML)
    pub value: String,
    /// When a link in the value was verified
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// A custom emoji
///
/// <https://docs.joinmastodon.org/entities/CustomEmoji/>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmoji {
    /// Name used between colons
    pub shortcode: String,
    /// Image URL
    pub url: String,
    /// Non-animated image URL
    #[serde(default)]
    pub static_url: String,
    /// Whether it shows up in the picker
    #[serde(default)]
    pub visible_in_picker: bool,
    /// Picker category
    #[serde(default)]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{decode, fixtures};
    use serde_json::json;

    #[test]
    fn test_decode_full_account() {
        let account: Account = decode(fixtures::account()).unwrap();
        assert_eq!(account.id, "109289749579593700");
        assert_eq!(account.username, "dunkyl");
        assert_eq!(account.followers_count, 5);
        assert_eq!(
            account.last_status_at,
            NaiveDate::from_ymd_opt(2023, 3, 3)
        );
        assert!(account.created_at.is_some());
    }

    #[test]
    fn test_minimal_account_round_trips() {
        let payload = json!({
            "id": "1",
            "username": "alice",
            "acct": "alice",
            "url": "https://example.social/@alice"
        });

        let account: Account = decode(payload).unwrap();
        assert_eq!(account.display_name, "");
        assert!(account.fields.is_empty());

        let encoded = serde_json::to_value(&account).unwrap();
        let again: Account = decode(encoded).unwrap();
        assert_eq!(account, again);
    }

    #[test]
    fn test_missing_required_field() {
        for field in ["id", "username", "acct", "url"] {
            let mut payload = fixtures::account();
            payload.as_object_mut().unwrap().remove(field);

            match decode::<Account>(payload) {
                Err(Error::Decode { field: Some(f), .. }) => assert_eq!(f, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_bad_timestamp_is_decode_error() {
        let mut payload = fixtures::account();
        payload["created_at"] = json!("yesterday-ish");
        let err = decode::<Account>(payload).unwrap_err();
        assert!(matches!(err, Error::Decode { entity: "Account", .. }));
    }

    #[test]
    fn test_at_username() {
        let mut account: Account = decode(fixtures::account()).unwrap();
        assert_eq!(account.at_username(), "@dunkyl@mastodon.skye.vg");

        account.acct = "dunkyl@elsewhere.social".to_string();
        assert_eq!(account.at_username(), "@dunkyl@elsewhere.social");
    }
}
