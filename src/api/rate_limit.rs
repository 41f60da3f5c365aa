//! Rate-limit hints from 429 responses

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Mastodon's reset header (RFC 3339 instant)
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// How long the instance asked us to wait, if it said
///
/// Tries `Retry-After` (delta seconds, then HTTP date) and then
/// `X-RateLimit-Reset`. Instants in the past count as zero.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(value) = header_str(headers, RETRY_AFTER.as_str()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
        if let Ok(at) = DateTime::parse_from_rfc2822(value) {
            return Some(until(at.with_timezone(&Utc), now));
        }
    }

    header_str(headers, RATELIMIT_RESET)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|at| until(at.with_timezone(&Utc), now))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
