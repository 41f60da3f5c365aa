//! OAuth2 authorization-code grant
//!
//! ```text
//! Start ──listen/start──▶ AwaitingRedirect ──code──▶ Exchanging ──2xx──▶ Complete
//!                               │                        │
//!                  error / cancel / timeout            non-2xx
//!                               ▼                        ▼
//!                             Failed ◀───────────────────┘
//! ```
//!
//! `Complete` and `Failed` are terminal. A failed exchange is never retried:
//! authorization codes are single-use.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::credentials::{AppCredentials, UserCredentials};
use super::listener::{Redirect, RedirectListener};
use crate::error::{Error, Result};
use crate::models::Entity;

/// Scopes requested when none are configured
pub const DEFAULT_SCOPES: &[&str] = &["read", "write"];

/// Why a grant ended in [`GrantState::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The redirect carried an OAuth2 `error` (e.g. `access_denied`)
    Denied(String),
    /// The token endpoint answered with a non-success status
    Exchange(u16),
    /// Cancelled or timed out while waiting for the redirect
    Cancelled,
    /// Anything else (listener I/O, transport, undecodable token)
    Other(String),
}

/// Where an [`Authenticator`] is in the grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantState {
    /// Nothing bound yet
    Start,
    /// Listener bound, waiting for the browser to come back
    AwaitingRedirect,
    /// Trading the code for a token
    Exchanging,
    /// User credentials obtained
    Complete,
    /// The grant failed
    Failed(FailureReason),
}

impl GrantState {
    /// Whether no further transitions are possible
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    scope: Option<String>,
}

impl Entity for TokenResponse {
    const KIND: &'static str = "Token";
}

/// Runs the authorization-code grant for one application
pub struct Authenticator {
    app: AppCredentials,
    scopes: Vec<String>,
    http: Client,
    csrf_state: String,
    timeout: Option<Duration>,
    state: GrantState,
}

impl Authenticator {
    /// Prepare a grant; the application file must be filled in
    pub fn new(app: AppCredentials) -> Result<Self> {
        app.validate()?;
        Ok(Self {
            app,
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            http: Client::new(),
            csrf_state: uuid::Uuid::new_v4().simple().to_string(),
            timeout: None,
            state: GrantState::Start,
        })
    }

    /// Request these scopes instead of the defaults
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Use a preconfigured HTTP client for the token exchange
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Give up waiting for the redirect after this long
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Current state
    pub const fn state(&self) -> &GrantState {
        &self.state
    }

    /// URL the user must visit to approve the application
    pub fn authorization_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/oauth/authorize", self.app.instance_url))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.app.id)
            .append_pair("redirect_uri", &self.app.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.csrf_state);
        Ok(url)
    }

    /// Bind the redirect listener without opening a browser
    pub async fn listen(&mut self) -> Result<RedirectListener> {
        self.expect_state(&GrantState::Start)?;

        let redirect = self.app.redirect_url()?;
        match RedirectListener::bind(&redirect).await {
            Ok(listener) => {
                self.transition(GrantState::AwaitingRedirect);
                Ok(listener)
            }
            Err(e) => Err(self.fail(FailureReason::Other(e.to_string()), e)),
        }
    }

    /// Bind the redirect listener and send the user to the authorization page
    pub async fn start(&mut self, open_browser: bool) -> Result<RedirectListener> {
        let url = self.authorization_url()?;
        let listener = self.listen().await?;

        if open_browser {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!("Could not open a browser for {url}: {e}");
            }
        }

        Ok(listener)
    }

    /// Wait for the redirect and exchange the code for user credentials
    ///
    /// The listener is consumed, so its port is released whatever the outcome.
    pub async fn finish(
        &mut self,
        listener: RedirectListener,
        cancel: &CancellationToken,
    ) -> Result<UserCredentials> {
        self.expect_state(&GrantState::AwaitingRedirect)?;

        let waited = listener
            .wait(Some(self.csrf_state.as_str()), cancel, self.timeout)
            .await;
        let redirect = match waited {
            Ok(redirect) => redirect,
            Err(e @ Error::Cancelled(_)) => return Err(self.fail(FailureReason::Cancelled, e)),
            Err(Error::OAuthRedirect { code, description }) => {
                return Err(self.fail(
                    FailureReason::Denied(code.clone()),
                    Error::OAuthRedirect { code, description },
                ));
            }
            Err(e) => return Err(self.fail(FailureReason::Other(e.to_string()), e)),
        };

        match redirect {
            Redirect::Code(code) => self.exchange(&code).await,
            Redirect::Error { code, description } => Err(self.fail(
                FailureReason::Denied(code.clone()),
                Error::OAuthRedirect { code, description },
            )),
        }
    }

    /// Run the whole grant: start, wait, exchange
    pub async fn grant(
        &mut self,
        open_browser: bool,
        cancel: &CancellationToken,
    ) -> Result<UserCredentials> {
        let listener = self.start(open_browser).await?;
        self.finish(listener, cancel).await
    }

    async fn exchange(&mut self, code: &str) -> Result<UserCredentials> {
        self.transition(GrantState::Exchanging);

        let url = format!("{}/oauth/token", self.app.instance_url);
        let scope = self.scopes.join(" ");
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.app.id.as_str()),
            ("client_secret", self.app.secret.as_str()),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = match self.http.post(&url).form(&params).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(FailureReason::Other(e.to_string()), e.into())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.fail(
                FailureReason::Exchange(status.as_u16()),
                Error::OAuthExchange {
                    status: status.as_u16(),
                    body,
                },
            ));
        }

        let token = match response.bytes().await {
            Ok(bytes) => TokenResponse::decode_slice(&bytes),
            Err(e) => Err(e.into()),
        };
        let token = match token {
            Ok(token) => token,
            Err(e) => return Err(self.fail(FailureReason::Other(e.to_string()), e)),
        };

        let scopes: Vec<String> = match token.scope.as_deref().map(str::trim) {
            Some(granted) if !granted.is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => self.scopes.clone(),
        };

        let credentials = UserCredentials::new(&token.access_token, &self.app.instance_url, scopes);
        self.complete(credentials)
    }

    fn complete(&mut self, credentials: Result<UserCredentials>) -> Result<UserCredentials> {
        match credentials {
            Ok(credentials) => {
                self.transition(GrantState::Complete);
                Ok(credentials)
            }
            Err(e) => Err(self.fail(FailureReason::Other(e.to_string()), e)),
        }
    }

    fn expect_state(&self, expected: &GrantState) -> Result<()> {
        if &self.state == expected {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "authorization flow is in state {:?}, expected {:?}",
                self.state, expected
            )))
        }
    }

    fn transition(&mut self, next: GrantState) {
        tracing::info!("OAuth grant: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: FailureReason, error: Error) -> Error {
        tracing::warn!("OAuth grant failed: {error}");
        self.transition(GrantState::Failed(reason));
        error
    }
}
