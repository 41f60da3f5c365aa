//! Paginated results and opaque cursors

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque pagination token taken from a `Link` header
///
/// The token is never parsed or built by the client; it is handed back to the
/// instance under the same query parameter it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    param: String,
    token: String,
}

impl Cursor {
    /// Create a cursor for a query parameter
    pub fn new(param: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            token: token.into(),
        }
    }

    /// Query parameter the token travels in (e.g. `max_id`)
    pub fn param(&self) -> &str {
        &self.param
    }

    /// The token itself, unmodified
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl PartialEq<str> for Cursor {
    fn eq(&self, other: &str) -> bool {
        self.token == other
    }
}

impl PartialEq<&str> for Cursor {
    fn eq(&self, other: &&str) -> bool {
        self.token == *other
    }
}

/// One page of results plus the cursors around it
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in server order
    pub items: Vec<T>,
    /// Cursor for the following (older) page
    pub next_cursor: Option<Cursor>,
    /// Cursor for the preceding (newer) page
    pub prev_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the instance advertised another page
    pub const fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
