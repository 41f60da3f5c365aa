//! Error taxonomy shared by every layer of the client

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field the instance (or local validation) complained about
    pub field: String,
    /// Machine-readable code, e.g. `ERR_BLANK`
    pub code: String,
    /// Human-readable description
    pub description: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: &str, code: &str, description: &str) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            description: description.to_string(),
        }
    }
}

/// Everything that can go wrong talking to an instance
#[derive(Debug, Error)]
pub enum Error {
    /// A payload was malformed or incomplete
    #[error("failed to decode {entity}: {reason}")]
    Decode {
        /// Entity kind being decoded (e.g. `Status`)
        entity: &'static str,
        /// Missing field, when the failure is a missing required field
        field: Option<String>,
        /// Underlying decoder message
        reason: String,
    },

    /// A persisted credential file could not be read back
    #[error("invalid credential file {}: {reason}", path.display())]
    CredentialFormat {
        /// File that failed to load
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Authentication is required but absent or rejected
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but the token lacks the needed scope
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource does not exist (or is no longer visible)
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was rejected as invalid, locally or by the instance
    #[error("validation failed: {message}")]
    Validation {
        /// Summary message
        message: String,
        /// Per-field failures
        fields: Vec<FieldError>,
    },

    /// Still rate limited after the single automatic retry
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Remaining wait before the instance accepts requests again
        retry_after: Duration,
    },

    /// The instance failed with a 5xx status
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error body returned by the instance
        message: String,
    },

    /// Any other non-success status
    #[error("unexpected status {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error body returned by the instance
        message: String,
    },

    /// The authorization redirect carried an `error` instead of a code
    #[error("authorization refused: {code}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    OAuthRedirect {
        /// OAuth2 error code, e.g. `access_denied`
        code: String,
        /// Optional `error_description`
        description: Option<String>,
    },

    /// The token endpoint rejected the authorization code
    #[error("token exchange failed with status {status}: {body}")]
    OAuthExchange {
        /// HTTP status code from the token endpoint
        status: u16,
        /// Error body returned by the instance
        body: String,
    },

    /// The authorization flow was cancelled before completing
    #[error("authorization cancelled: {0}")]
    Cancelled(String),

    /// Transport failure (connect, timeout, TLS, body read)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be parsed
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Misconfiguration detected before any network call
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a local validation error for a single field
    pub fn invalid(field: &str, code: &str, description: &str) -> Self {
        Self::Validation {
            message: format!("{field} {description}"),
            fields: vec![FieldError::new(field, code, description)],
        }
    }

    /// Whether retrying later could succeed without changing the request
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Server { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Short, stable name of the error kind (used by the CLI)
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::CredentialFormat { .. } => "credential-format",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not-found",
            Self::Validation { .. } => "validation",
            Self::RateLimited { .. } => "rate-limited",
            Self::Server { .. } => "server",
            Self::Http { .. } => "http",
            Self::OAuthRedirect { .. } => "oauth-redirect",
            Self::OAuthExchange { .. } => "oauth-exchange",
            Self::Cancelled(_) => "cancelled",
            Self::Transport(_) => "transport",
            Self::Io(_) => "io",
            Self::Url(_) => "url",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let limited = Error::RateLimited {
            retry_after: Duration::from_secs(30),
        };
        assert!(limited.is_transient());

        let server = Error::Server {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(server.is_transient());

        assert!(!Error::NotFound("gone".to_string()).is_transient());
        assert!(!Error::Forbidden("scope".to_string()).is_transient());
        assert!(!Error::invalid("status", "ERR_BLANK", "can't be blank").is_transient());
    }

    #[test]
    fn test_display() {
        let err = Error::OAuthRedirect {
            code: "access_denied".to_string(),
            description: Some("The user denied".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "authorization refused: access_denied (The user denied)"
        );
        assert_eq!(err.kind(), "oauth-redirect");

        let limited = Error::RateLimited {
            retry_after: Duration::from_secs(12),
        };
        assert_eq!(limited.to_string(), "rate limited, retry after 12s");
    }
}
