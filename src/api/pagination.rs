//! `Link` header parsing
//!
//! Mastodon paginates with RFC 8288 links:
//!
//! ```text
//! Link: <https://mastodon.example/api/v1/timelines/home?max_id=109>; rel="next",
//!       <https://mastodon.example/api/v1/timelines/home?min_id=110>; rel="prev"
//! ```
//!
//! Only the cursor parameter is kept from each target; its value is stored
//! verbatim and never interpreted.

use reqwest::header::{HeaderMap, LINK};
use url::Url;

use crate::models::Cursor;

/// Query parameters that carry a pagination token, in order of preference
pub const CURSOR_PARAMS: &[&str] = &["max_id", "min_id", "since_id", "cursor", "offset"];

/// Next and previous cursors advertised by a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    /// `rel="next"`
    pub next: Option<Cursor>,
    /// `rel="prev"` (or `rel="previous"`)
    pub prev: Option<Cursor>,
}

impl Links {
    /// Collect cursors from every `Link` header in the response
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut links = Self::default();
        for value in headers.get_all(LINK) {
            let Ok(value) = value.to_str() else {
                tracing::debug!("Ignoring non-ASCII Link header");
                continue;
            };
            for (target, rels) in parse_link_value(value) {
                let Some(cursor) = cursor_from_target(&target) else {
                    continue;
                };
                for rel in rels {
                    match rel.as_str() {
                        "next" if links.next.is_none() => links.next = Some(cursor.clone()),
                        "prev" | "previous" if links.prev.is_none() => {
                            links.prev = Some(cursor.clone());
                        }
                        _ => {}
                    }
                }
            }
        }
        links
    }
}

/// Split a `Link` header value into `(target, rels)` pairs
fn parse_link_value(value: &str) -> Vec<(String, Vec<String>)> {
    let mut out = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let target = &after[..end];
        let tail = &after[end + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());

        let rels = tail[..params_end]
            .split(';')
            .filter_map(|param| {
                let param = param.trim().trim_end_matches(',').trim();
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("rel")
                    .then(|| value.trim().trim_matches('"').to_string())
            })
            .flat_map(|rel| {
                rel.split_whitespace()
                    .map(str::to_ascii_lowercase)
                    .collect::<Vec<_>>()
            })
            .collect();

        out.push((target.to_string(), rels));
        rest = &tail[params_end..];
    }

    out
}

/// Find the cursor parameter in a link target (absolute or relative)
fn cursor_from_target(target: &str) -> Option<Cursor> {
    let url = Url::parse("http://localhost/").ok()?.join(target).ok()?;
    CURSOR_PARAMS.iter().find_map(|param| {
        url.query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| Cursor::new(*param, value.into_owned()))
    })
}
