//! Mastodon API clients
//!
//! [`PublicClient`] covers endpoints that work without a user token;
//! [`Mastodon`] adds the authenticated ones and dereferences to the public
//! client. Both are built with a [`ClientBuilder`].

pub mod executor;
pub mod mastodon;
pub mod pagination;
pub mod public;
pub mod rate_limit;

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::auth::UserCredentials;
use crate::config::Config;
use crate::error::{Error, Result};

pub use executor::{Auth, Executor, Request};
pub use mastodon::{Mastodon, MediaUpload, NewStatus};
pub use public::PublicClient;

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("tootkit/", env!("CARGO_PKG_VERSION"));

/// Normalize an instance address to `https://host[:port]` with no trailing slash
///
/// A bare host name gets `https://` prepended.
pub fn normalize_instance(instance: &str) -> Result<String> {
    let trimmed = instance.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("instance URL is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("instance URL {trimmed} has no host")));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Builder for [`PublicClient`] and [`Mastodon`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    instance: String,
    timeout: Duration,
    user_agent: String,
    backoff: Duration,
    access_token: Option<String>,
    http: Option<Client>,
}

impl ClientBuilder {
    /// Start building a client for an instance
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            backoff: Duration::from_secs(5),
            access_token: None,
            http: None,
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: &Config, instance: impl Into<String>) -> Self {
        Self::new(instance)
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .rate_limit_backoff(config.rate_limit_backoff())
    }

    /// Per-request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User-Agent header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Wait used after a 429 that carries no hint
    pub const fn rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// User access token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Use the instance and token from saved user credentials
    pub fn credentials(mut self, credentials: &UserCredentials) -> Self {
        self.instance.clone_from(&credentials.instance_url);
        self.access_token = Some(credentials.access_token.clone());
        self
    }

    /// Use a preconfigured reqwest client; timeout and user agent are then ignored
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build an unauthenticated client, dropping any configured token
    pub fn build_public(mut self) -> Result<PublicClient> {
        self.access_token = None;
        Ok(PublicClient::from_executor(self.executor()?))
    }

    /// Build a client that sends the configured token
    ///
    /// Building without a token succeeds; authenticated calls then fail with
    /// [`Error::Unauthenticated`] before touching the network.
    pub fn build(self) -> Result<Mastodon> {
        Ok(Mastodon::from_public(PublicClient::from_executor(
            self.executor()?,
        )))
    }

    fn executor(self) -> Result<Executor> {
        let base_url = normalize_instance(&self.instance)?;
        let http = match self.http {
            Some(http) => http,
            None => Client::builder()
                .timeout(self.timeout)
                .user_agent(self.user_agent)
                .build()?,
        };
        let token = self.access_token.filter(|t| !t.trim().is_empty());
        Ok(Executor::new(http, base_url, token, self.backoff))
    }
}
