//! Request execution: auth, rate-limit retry, error mapping, decoding
//!
//! Every endpoint method builds a [`Request`] and hands it to an
//! [`Executor`]. A call makes one round trip, plus exactly one more if the
//! first answer is a 429.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mastodon::MediaUpload;
use super::pagination::Links;
use super::rate_limit;
use crate::error::{Error, FieldError, Result};
use crate::models::{Cursor, Entity, Page};

/// Whether a request carries the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Auth {
    /// Never send the token
    None,
    /// Send the token when one is configured
    #[default]
    Optional,
    /// Fail without a network call when no token is configured
    Required,
}

/// Request payload
#[derive(Debug, Clone)]
pub enum Body {
    /// JSON document
    Json(Value),
    /// Multipart file upload, rebuilt for each attempt
    Multipart(MediaUpload),
}

/// A logical API request, independent of any attempt to send it
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(&'static str, String)>,
    body: Option<Body>,
    auth: Auth,
}

impl Request {
    /// Request with an arbitrary method
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            auth: Auth::default(),
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter when present
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Continue from a pagination cursor, replacing any parameter of the same name
    pub fn cursor(mut self, cursor: Option<&Cursor>) -> Self {
        if let Some(cursor) = cursor {
            self.query.retain(|(key, _)| key != cursor.param());
            self.query
                .push((cursor.param().to_string(), cursor.token().to_string()));
        }
        self
    }

    /// Add a request header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Send a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::Config(format!("unserializable request body: {e}")))?;
        self.body = Some(Body::Json(value));
        Ok(self)
    }

    /// Send a multipart upload
    pub fn multipart(mut self, upload: MediaUpload) -> Self {
        self.body = Some(Body::Multipart(upload));
        self
    }

    /// Set the authentication requirement
    pub const fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Require a user access token
    pub const fn authenticated(self) -> Self {
        self.auth(Auth::Required)
    }

    /// HTTP method
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path below the instance URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// One attempt's outcome
enum Attempt {
    /// Anything but a 429
    Answered(Response),
    /// 429, with how long to wait
    RateLimited(Duration),
}

/// Sends [`Request`]s to one instance on behalf of one identity
#[derive(Debug, Clone)]
pub struct Executor {
    http: Client,
    base_url: String,
    token: Option<String>,
    default_backoff: Duration,
}

impl Executor {
    /// Create an executor for an instance base URL
    pub const fn new(
        http: Client,
        base_url: String,
        token: Option<String>,
        default_backoff: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            token,
            default_backoff,
        }
    }

    /// Instance base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a user access token is configured
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Send a request and decode the body as `T`
    pub async fn execute<T: Entity>(&self, request: &Request) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        T::decode_slice(&bytes)
    }

    /// Send a request and decode a page of `T` plus its cursors
    pub async fn execute_page<T: Entity>(&self, request: &Request) -> Result<Page<T>> {
        let response = self.send(request).await?;
        let links = Links::from_headers(response.headers());
        let bytes = response.bytes().await?;

        Ok(Page {
            items: Vec::<T>::decode_slice(&bytes)?,
            next_cursor: links.next,
            prev_cursor: links.prev,
        })
    }

    /// Send a request whose body (if any) is not needed
    pub async fn execute_empty(&self, request: &Request) -> Result<()> {
        self.send(request).await?;
        Ok(())
    }

    /// Send a request, retrying once on 429, and return the 2xx response
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let token = match (request.auth, self.token.as_deref()) {
            (Auth::Required, None) => {
                return Err(Error::Unauthenticated(format!(
                    "{} {} requires a user access token",
                    request.method, request.path
                )));
            }
            (Auth::None, _) => None,
            (_, token) => token,
        };

        let response = match self.attempt(request, token).await? {
            Attempt::Answered(response) => response,
            Attempt::RateLimited(wait) => {
                tracing::warn!(
                    "Rate limited on {} {}, retrying in {}ms",
                    request.method,
                    request.path,
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;

                match self.attempt(request, token).await? {
                    Attempt::Answered(response) => response,
                    Attempt::RateLimited(retry_after) => {
                        return Err(Error::RateLimited { retry_after });
                    }
                }
            }
        };

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn attempt(&self, request: &Request, token: Option<&str>) -> Result<Attempt> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        builder = match &request.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Multipart(upload)) => builder.multipart(upload.to_form()?),
            None => builder,
        };

        tracing::debug!(method = %request.method, %url, "sending request");
        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(method = %request.method, %url, %status, "received response");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = rate_limit::retry_after(response.headers(), Utc::now())
                .unwrap_or(self.default_backoff);
            return Ok(Attempt::RateLimited(wait));
        }

        Ok(Attempt::Answered(response))
    }
}

/// Error body shape used by Mastodon
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    details: BTreeMap<String, Vec<ApiErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    error: String,
    #[serde(default)]
    description: String,
}

/// Map a non-2xx response onto the error taxonomy
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = body
        .error_description
        .or(body.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("no message").to_string()
            } else {
                text.clone()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthenticated(message),
        StatusCode::FORBIDDEN => Error::Forbidden(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let fields = body
                .details
                .into_iter()
                .flat_map(|(field, details)| {
                    details
                        .into_iter()
                        .map(move |d| FieldError::new(&field, &d.error, &d.description))
                })
                .collect();
            Error::Validation { message, fields }
        }
        s if s.is_server_error() => Error::Server {
            status: s.as_u16(),
            message,
        },
        s => Error::Http {
            status: s.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Status, fixtures};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(server: &MockServer, token: Option<&str>) -> Executor {
        Executor::new(
            Client::new(),
            server.uri(),
            token.map(str::to_string),
            Duration::from_millis(10),
        )
    }

    async fn calls(server: &MockServer) -> usize {
        server.received_requests().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_429_then_success_makes_two_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::status("1", "hi")))
            .expect(1)
            .mount(&server)
            .await;

        let status: Status = executor(&server, None)
            .execute(&Request::get("/api/v1/statuses/1"))
            .await
            .unwrap();

        assert_eq!(status.id, "1");
        assert_eq!(calls(&server).await, 2);
    }

    #[tokio::test]
    async fn test_second_429_is_surfaced_without_third_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let err = executor(&server, None)
            .execute::<Status>(&Request::get("/api/v1/statuses/1"))
            .await
            .unwrap_err();

        match err {
            Error::RateLimited { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(10));
            }
            other => panic!("expected rate limited, got {other:?}"),
        }
        assert_eq!(calls(&server).await, 2);
    }

    #[tokio::test]
    async fn test_rate_limited_carries_remaining_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&server)
            .await;

        let err = executor(&server, None)
            .execute_empty(&Request::get("/api/v1/instance"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RateLimited { retry_after } if retry_after == Duration::from_secs(120)
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_required_auth_without_token_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = executor(&server, None)
            .execute_empty(&Request::get("/api/v1/accounts/verify_credentials").authenticated())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unauthenticated(_)));
        assert_eq!(calls(&server).await, 0);
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        executor(&server, Some("secret-token"))
            .execute_empty(&Request::get("/api/v1/accounts/verify_credentials").authenticated())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_token_when_auth_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        executor(&server, Some("secret-token"))
            .execute_empty(&Request::get("/api/v1/instance").auth(Auth::None))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let cases = [
            (401, json!({"error": "The access token is invalid"})),
            (403, json!({"error": "This action is outside the authorized scopes"})),
            (404, json!({"error": "Record not found"})),
            (410, json!({"error": "Gone"})),
            (503, json!({"error": "Service Unavailable"})),
        ];

        for (code, body) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(code).set_body_json(body))
                .expect(1)
                .mount(&server)
                .await;

            let err = executor(&server, Some("t"))
                .execute_empty(&Request::get("/api/v1/statuses/1"))
                .await
                .unwrap_err();

            match (code, &err) {
                (401, Error::Unauthenticated(m)) => assert_eq!(m, "The access token is invalid"),
                (403, Error::Forbidden(_)) | (404, Error::NotFound(_)) => {}
                (410, Error::Http { status: 410, .. }) => {}
                (503, Error::Server { status: 503, .. }) => assert!(err.is_transient()),
                _ => panic!("status {code} mapped to {err:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = executor(&server, None)
            .execute_empty(&Request::get("/api/v1/instance"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Server { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn test_validation_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": "Validation failed: Text can't be blank",
                "details": {
                    "text": [{"error": "ERR_BLANK", "description": "can't be blank"}]
                }
            })))
            .mount(&server)
            .await;

        let err = executor(&server, Some("t"))
            .execute_empty(&Request::post("/api/v1/statuses"))
            .await
            .unwrap_err();

        match err {
            Error::Validation { message, fields } => {
                assert_eq!(message, "Validation failed: Text can't be blank");
                assert_eq!(fields, vec![FieldError::new("text", "ERR_BLANK", "can't be blank")]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pagination_round_trip() {
        let server = MockServer::start().await;
        let next = format!(r#"<{}/api/v1/timelines/public?cursor=abc>; rel="next""#, server.uri());
        Mock::given(method("GET"))
            .and(path("/api/v1/timelines/public"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([fixtures::status("1", "older")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/timelines/public"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next.as_str())
                    .set_body_json(json!([fixtures::status("2", "newer")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let exec = executor(&server, None);
        let first: Page<Status> = exec
            .execute_page(&Request::get("/api/v1/timelines/public"))
            .await
            .unwrap();
        assert_eq!(first.items[0].id, "2");
        let cursor = first.next_cursor.clone().unwrap();
        assert_eq!(cursor, "abc");

        let second: Page<Status> = exec
            .execute_page(&Request::get("/api/v1/timelines/public").cursor(Some(&cursor)))
            .await
            .unwrap();
        assert_eq!(second.items[0].id, "1");
        assert!(!second.has_next());
    }

    #[test]
    fn test_cursor_replaces_existing_param() {
        let request = Request::get("/api/v1/timelines/home")
            .query("max_id", "1")
            .query("limit", 20)
            .cursor(Some(&Cursor::new("max_id", "99")));
        assert_eq!(
            request.query_pairs(),
            &[
                ("limit".to_string(), "20".to_string()),
                ("max_id".to_string(), "99".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_undecodable_success_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .mount(&server)
            .await;

        let err = executor(&server, None)
            .execute::<Status>(&Request::get("/api/v1/statuses/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { entity: "Status", .. }));
    }
}
