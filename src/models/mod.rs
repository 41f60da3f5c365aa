//! Typed entities returned by the Mastodon API
//!
//! Every entity is a plain serde value. Unknown keys are ignored, enum fields
//! fall back to an `Unknown` variant, and decode failures are reported as
//! [`Error::Decode`] naming the entity and, when applicable, the missing field.

mod account;
mod media;
mod page;
mod scheduled_status;
mod status;

pub use account::{Account, AccountField, CustomEmoji};
pub use media::{MediaAttachment, MediaType};
pub use page::{Cursor, Page};
pub use scheduled_status::{ScheduledParams, ScheduledStatus};
pub use status::{
    Application, Mention, Poll, PollOption, PreviewCard, PreviewType, Status, Tag, Visibility,
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// A resource that can be decoded from an API payload
pub trait Entity: DeserializeOwned {
    /// Entity kind used in decode errors
    const KIND: &'static str;

    /// Decode an already-parsed JSON value
    fn decode(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| decode_error(Self::KIND, &e))
    }

    /// Decode raw response bytes
    fn decode_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| decode_error(Self::KIND, &e))
    }
}

impl<T: Entity> Entity for Vec<T> {
    const KIND: &'static str = T::KIND;
}

/// Decode a JSON value into any entity
pub fn decode<T: Entity>(value: Value) -> Result<T> {
    T::decode(value)
}

fn decode_error(entity: &'static str, err: &serde_json::Error) -> Error {
    let reason = err.to_string();
    Error::Decode {
        entity,
        field: missing_field(&reason),
        reason,
    }
}

/// Pull the field name out of serde's "missing field `x`" message
fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next().map(str::to_string)
}
