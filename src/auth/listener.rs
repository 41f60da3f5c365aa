//! Loopback listener that catches the OAuth2 authorization redirect
//!
//! [`RedirectListener::bind`] reserves the port; [`RedirectListener::wait`]
//! serves an axum router on it until the first redirect arrives. Every way out
//! of `wait` (redirect received, cancellation, timeout, or the future being
//! dropped) stops the server and frees the port.

use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};

/// How long open connections get to finish once the redirect is handled
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>You can close this window and try again.</p></body>
</html>"#;

/// What the instance redirected the browser back with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// The user approved; exchange this code for a token
    Code(String),
    /// The user (or instance) refused
    Error {
        /// OAuth2 error code, e.g. `access_denied`
        code: String,
        /// Optional `error_description`
        description: Option<String>,
    },
}

/// Query parameters an authorization server may put on the redirect
#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    state: Option<String>,
}

impl RedirectParams {
    /// `error` wins over `code`; neither means this was not a redirect
    fn into_redirect(self) -> Option<(Redirect, Option<String>)> {
        match (self.error, self.code) {
            (Some(code), _) => Some((
                Redirect::Error {
                    code,
                    description: self.error_description,
                },
                self.state,
            )),
            (None, Some(code)) => Some((Redirect::Code(code), self.state)),
            (None, None) => None,
        }
    }
}

type Outcome = Result<Redirect>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Option<Arc<str>>,
    outcome: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

/// A bound loopback socket waiting for one redirect
#[derive(Debug)]
pub struct RedirectListener {
    listener: TcpListener,
    path: String,
}

impl RedirectListener {
    /// Bind the host and port named by the redirect URI
    pub async fn bind(redirect_uri: &Url) -> Result<Self> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| Error::Config(format!("redirect_uri {redirect_uri} has no host")))?
            .trim_start_matches('[')
            .trim_end_matches(']');
        let port = redirect_uri.port_or_known_default().unwrap_or(80);

        let path = redirect_uri.path().to_string();
        if path.contains(['{', '}'])
            || path.split('/').any(|segment| segment.starts_with([':', '*']))
        {
            return Err(Error::Config(format!(
                "redirect_uri path {path} cannot be served"
            )));
        }

        let listener = TcpListener::bind((host, port)).await?;
        tracing::info!(
            "Listening for OAuth redirect on {}",
            listener.local_addr()?
        );

        Ok(Self { listener, path })
    }

    /// Address actually bound (useful when the redirect URI names port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the redirect, consuming (and unbinding) the listener
    ///
    /// Requests for other paths, or without `code`/`error`, are answered with
    /// a 404 and ignored. When `expected_state` is set, a code whose `state`
    /// does not match is rejected.
    pub async fn wait(
        self,
        expected_state: Option<&str>,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<Redirect> {
        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            expected_state: expected_state.map(Arc::from),
            outcome: Arc::new(Mutex::new(Some(tx))),
        };
        let router = Router::new()
            .route(&self.path, get(handle_redirect))
            .fallback(not_found)
            .with_state(state);

        let mut server = Server::spawn(self.listener, router, cancel.child_token());

        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                Err(Error::Cancelled("cancelled while waiting for redirect".to_string()))
            }
            () = deadline => {
                Err(Error::Cancelled("timed out waiting for redirect".to_string()))
            }
            received = rx => received.unwrap_or_else(|_| {
                Err(Error::Io(std::io::Error::other("redirect listener stopped")))
            }),
        };

        server.stop().await;
        outcome
    }
}

/// The running axum server; aborted on drop so the port never outlives `wait`
struct Server {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl Server {
    fn spawn(listener: TcpListener, router: Router, shutdown: CancellationToken) -> Self {
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
            {
                tracing::warn!("Redirect listener failed: {e}");
            }
        });
        Self { handle, shutdown }
    }

    async fn stop(&mut self) {
        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.handle)
            .await
            .is_err()
        {
            tracing::debug!("Redirect listener still has open connections, aborting it");
            self.handle.abort();
            let _ = (&mut self.handle).await;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

async fn handle_redirect(
    State(state): State<CallbackState>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<&'static str>) {
    let Some((redirect, returned_state)) = params.into_redirect() else {
        tracing::debug!("Ignoring redirect request without code or error");
        return (StatusCode::NOT_FOUND, Html(""));
    };

    let (status, page, outcome) = match redirect {
        Redirect::Code(_)
            if state
                .expected_state
                .as_deref()
                .is_some_and(|expected| returned_state.as_deref() != Some(expected)) =>
        {
            (
                StatusCode::BAD_REQUEST,
                FAILURE_PAGE,
                Err(Error::OAuthRedirect {
                    code: "state_mismatch".to_string(),
                    description: Some("redirect state did not match the request".to_string()),
                }),
            )
        }
        code @ Redirect::Code(_) => (StatusCode::OK, SUCCESS_PAGE, Ok(code)),
        error @ Redirect::Error { .. } => (StatusCode::OK, FAILURE_PAGE, Ok(error)),
    };

    let sender = state.outcome.lock().await.take();
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => tracing::debug!("Redirect already handled, ignoring another"),
    }

    (status, Html(page))
}

async fn not_found(uri: Uri) -> StatusCode {
    tracing::debug!("Ignoring request for {uri}");
    StatusCode::NOT_FOUND
}
