//! Endpoints that work without a user token

use super::executor::{Executor, Request};
use super::ClientBuilder;
use crate::error::{Error, Result};
use crate::models::{Account, Cursor, Page, Status};

/// Read-only client for one instance
#[derive(Debug, Clone)]
pub struct PublicClient {
    exec: Executor,
}

impl PublicClient {
    pub(crate) const fn from_executor(exec: Executor) -> Self {
        Self { exec }
    }

    /// Unauthenticated client with default settings
    pub fn new(instance: &str) -> Result<Self> {
        ClientBuilder::new(instance).build_public()
    }

    /// Builder for custom settings
    pub fn builder(instance: &str) -> ClientBuilder {
        ClientBuilder::new(instance)
    }

    /// Normalized instance base URL
    pub fn instance_url(&self) -> &str {
        self.exec.base_url()
    }

    /// Whether a user access token is configured
    pub const fn is_authenticated(&self) -> bool {
        self.exec.is_authenticated()
    }

    pub(crate) const fn executor(&self) -> &Executor {
        &self.exec
    }

    /// Account by instance-local ID
    pub async fn account(&self, id: &str) -> Result<Account> {
        let path = format!("/api/v1/accounts/{}", segment("id", id)?);
        self.exec.execute(&Request::get(path)).await
    }

    /// Account by webfinger address (`user` or `user@domain`, optional leading `@`)
    pub async fn lookup(&self, acct: &str) -> Result<Account> {
        let acct = acct.trim().trim_start_matches('@');
        if acct.is_empty() {
            return Err(Error::invalid("acct", "ERR_BLANK", "can't be blank"));
        }
        self.exec
            .execute(&Request::get("/api/v1/accounts/lookup").query("acct", acct))
            .await
    }

    /// Account by `@address` or by ID
    pub async fn user(&self, at_or_id: &str) -> Result<Account> {
        if at_or_id.trim_start().starts_with('@') {
            self.lookup(at_or_id).await
        } else {
            self.account(at_or_id).await
        }
    }

    /// Status by ID
    pub async fn status(&self, id: &str) -> Result<Status> {
        let path = format!("/api/v1/statuses/{}", segment("id", id)?);
        self.exec.execute(&Request::get(path)).await
    }

    /// Statuses posted by an account, newest first
    pub async fn account_statuses(
        &self,
        id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Status>> {
        let path = format!("/api/v1/accounts/{}/statuses", segment("id", id)?);
        self.exec
            .execute_page(&Request::get(path).cursor(cursor))
            .await
    }

    /// Federated public timeline
    pub async fn public_timeline(&self, cursor: Option<&Cursor>) -> Result<Page<Status>> {
        self.exec
            .execute_page(&Request::get("/api/v1/timelines/public").cursor(cursor))
            .await
    }

    /// Public statuses with a hashtag (`#` optional)
    pub async fn hashtag_timeline(
        &self,
        tag: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Status>> {
        let tag = tag.trim().trim_start_matches('#');
        let path = format!("/api/v1/timelines/tag/{}", segment("tag", tag)?);
        self.exec
            .execute_page(&Request::get(path).cursor(cursor))
            .await
    }

    /// Release the connection pool
    pub fn close(self) {
        tracing::debug!(instance = %self.instance_url(), "closing client");
    }
}

/// Check a value is usable as a single path segment
pub(crate) fn segment<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid(field, "ERR_BLANK", "can't be blank"));
    }
    if value.contains(['/', '?', '#']) {
        return Err(Error::invalid(
            field,
            "ERR_INVALID",
            "must not contain '/', '?' or '#'",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> PublicClient {
        PublicClient::new(&server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/109289749579593700"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::account()))
            .expect(1)
            .mount(&server)
            .await;

        let account = client(&server)
            .await
            .account("109289749579593700")
            .await
            .unwrap();
        assert_eq!(account.username, "dunkyl");
        assert_eq!(account.statuses_count, 31);
    }

    #[tokio::test]
    async fn test_user_dispatches_on_at_sign() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/lookup"))
            .and(query_param("acct", "dunkyl@mastodon.skye.vg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::account()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::account()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        client.user("@dunkyl@mastodon.skye.vg").await.unwrap();
        client.user("42").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_status_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/404"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "Record not found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).await.status("404").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Record not found"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_hashtag_timeline_strips_hash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/timelines/tag/rustlang"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([fixtures::status("7", "#rustlang")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .await
            .hashtag_timeline("#rustlang", None)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_account_statuses_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/1/statuses"))
            .and(query_param("max_id", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .await
            .account_statuses("1", Some(&Cursor::new("max_id", "100")))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_bad_ids_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(matches!(client.status("").await, Err(Error::Validation { .. })));
        assert!(matches!(client.account("1/../2").await, Err(Error::Validation { .. })));
        assert!(matches!(client.lookup("@").await, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_close_consumes_client() {
        let client = PublicClient::new("example.social").unwrap();
        assert!(!client.is_authenticated());
        client.close();
    }
}
