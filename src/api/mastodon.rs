//! Authenticated Mastodon client

use std::fmt;
use std::ops::Deref;
use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use super::ClientBuilder;
use super::executor::{Executor, Request};
use super::public::{PublicClient, segment};
use crate::auth::UserCredentials;
use crate::error::{Error, Result};
use crate::models::{
    Account, Cursor, MediaAttachment, Page, ScheduledStatus, Status, Visibility,
};

/// Header that lets the instance drop a duplicate status creation
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// A status to publish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewStatus {
    /// Body text
    #[serde(rename = "status")]
    pub text: String,
    /// Visibility; the account default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// IDs of previously uploaded media
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_ids: Vec<String>,
    /// Status being replied to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<String>,
    /// Content warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_text: Option<String>,
    /// Mark attached media as sensitive
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    /// ISO 639 language code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl NewStatus {
    /// Status with a body and default settings
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set visibility
    #[must_use]
    pub const fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Attach an uploaded media ID
    #[must_use]
    pub fn media(mut self, id: impl Into<String>) -> Self {
        self.media_ids.push(id.into());
        self
    }

    /// Reply to a status
    #[must_use]
    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to_id = Some(id.into());
        self
    }

    /// Put the body behind a content warning
    #[must_use]
    pub fn spoiler(mut self, text: impl Into<String>) -> Self {
        self.spoiler_text = Some(text.into());
        self
    }

    /// Mark media sensitive
    #[must_use]
    pub const fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    /// Set language
    #[must_use]
    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.language = Some(code.into());
        self
    }

    /// Checks the instance would reject anyway
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() && self.media_ids.is_empty() {
            return Err(Error::invalid("status", "ERR_BLANK", "can't be blank"));
        }
        if self.visibility == Some(Visibility::Unknown) {
            return Err(Error::invalid(
                "visibility",
                "ERR_INCLUSION",
                "is not a known visibility",
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ScheduledBody<'a> {
    #[serde(flatten)]
    status: &'a NewStatus,
    scheduled_at: DateTime<Utc>,
}

/// A file to upload as a media attachment
#[derive(Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// File name sent with the upload
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub mime: String,
    /// File contents
    pub bytes: Vec<u8>,
    /// Alt text
    pub description: Option<String>,
}

impl MediaUpload {
    /// Upload from bytes already in memory
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
            description: None,
        }
    }

    /// Read a file, guessing the MIME type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        Ok(Self::new(file_name, mime.essence_str(), bytes))
    }

    /// Set alt text
    #[must_use]
    pub fn description(mut self, alt_text: impl Into<String>) -> Self {
        self.description = Some(alt_text.into());
        self
    }

    /// Build a fresh multipart form (forms are consumed on send)
    pub fn to_form(&self) -> Result<Form> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?;
        let mut form = Form::new().part("file", part);
        if let Some(description) = &self.description {
            form = form.text("description", description.clone());
        }
        Ok(form)
    }
}

impl fmt::Debug for MediaUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUpload")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .field("description", &self.description)
            .finish()
    }
}

/// Client acting on behalf of a logged-in user
///
/// Dereferences to [`PublicClient`], so every public endpoint is available too.
#[derive(Debug, Clone)]
pub struct Mastodon {
    public: PublicClient,
}

impl Deref for Mastodon {
    type Target = PublicClient;

    fn deref(&self) -> &Self::Target {
        &self.public
    }
}

impl Mastodon {
    pub(crate) const fn from_public(public: PublicClient) -> Self {
        Self { public }
    }

    /// Client for the instance and token in saved user credentials
    pub fn new(credentials: &UserCredentials) -> Result<Self> {
        ClientBuilder::new(credentials.instance_url.clone())
            .credentials(credentials)
            .build()
    }

    /// Builder for custom settings
    pub fn builder(instance: &str) -> ClientBuilder {
        ClientBuilder::new(instance)
    }

    /// Release the connection pool
    pub fn close(self) {
        self.public.close();
    }

    const fn exec(&self) -> &Executor {
        self.public.executor()
    }

    /// The authenticated account
    pub async fn me(&self) -> Result<Account> {
        self.exec()
            .execute(&Request::get("/api/v1/accounts/verify_credentials").authenticated())
            .await
    }

    /// Publish a status
    pub async fn post(&self, status: &NewStatus) -> Result<Status> {
        status.validate()?;
        let request = Request::post("/api/v1/statuses")
            .authenticated()
            .header(IDEMPOTENCY_KEY, uuid::Uuid::new_v4().to_string())
            .json(status)?;
        self.exec().execute(&request).await
    }

    /// Publish a plain public status
    pub async fn toot(&self, text: &str) -> Result<Status> {
        self.post(&NewStatus::new(text)).await
    }

    /// Reply to a status
    pub async fn reply(&self, text: &str, in_reply_to_id: &str) -> Result<Status> {
        let parent = segment("in_reply_to_id", in_reply_to_id)?;
        self.post(&NewStatus::new(text).in_reply_to(parent)).await
    }

    /// Have the instance publish a status later
    pub async fn schedule(&self, status: &NewStatus, at: DateTime<Utc>) -> Result<ScheduledStatus> {
        status.validate()?;
        if at <= Utc::now() {
            return Err(Error::invalid(
                "scheduled_at",
                "ERR_INVALID",
                "must be in the future",
            ));
        }
        let body = ScheduledBody {
            status,
            scheduled_at: at,
        };
        let request = Request::post("/api/v1/statuses")
            .authenticated()
            .header(IDEMPOTENCY_KEY, uuid::Uuid::new_v4().to_string())
            .json(&body)?;
        self.exec().execute(&request).await
    }

    /// Statuses waiting to be published
    pub async fn scheduled_statuses(
        &self,
        cursor: Option<&Cursor>,
    ) -> Result<Page<ScheduledStatus>> {
        self.exec()
            .execute_page(
                &Request::get("/api/v1/scheduled_statuses")
                    .authenticated()
                    .cursor(cursor),
            )
            .await
    }

    /// Drop a scheduled status before it is published
    pub async fn cancel_scheduled(&self, id: &str) -> Result<()> {
        let path = format!("/api/v1/scheduled_statuses/{}", segment("id", id)?);
        self.exec()
            .execute_empty(&Request::delete(path).authenticated())
            .await
    }

    /// Delete one of the user's statuses, returning it with its source text
    pub async fn delete(&self, id: &str) -> Result<Status> {
        let path = format!("/api/v1/statuses/{}", segment("id", id)?);
        self.exec()
            .execute(&Request::delete(path).authenticated())
            .await
    }

    /// Upload a media file for use in a later status
    ///
    /// Large files may still be processing when this returns; see
    /// [`MediaAttachment::is_processed`] and [`Mastodon::media`].
    pub async fn upload_media(&self, upload: MediaUpload) -> Result<MediaAttachment> {
        self.exec()
            .execute(
                &Request::post("/api/v2/media")
                    .authenticated()
                    .multipart(upload),
            )
            .await
    }

    /// Current state of an uploaded attachment
    pub async fn media(&self, id: &str) -> Result<MediaAttachment> {
        let path = format!("/api/v1/media/{}", segment("id", id)?);
        self.exec()
            .execute(&Request::get(path).authenticated())
            .await
    }

    /// The user's home timeline
    pub async fn home_timeline(&self, cursor: Option<&Cursor>) -> Result<Page<Status>> {
        self.exec()
            .execute_page(
                &Request::get("/api/v1/timelines/home")
                    .authenticated()
                    .cursor(cursor),
            )
            .await
    }

    /// Favourite a status
    pub async fn favourite(&self, id: &str) -> Result<Status> {
        self.status_action(id, "favourite").await
    }

    /// Undo a favourite
    pub async fn unfavourite(&self, id: &str) -> Result<Status> {
        self.status_action(id, "unfavourite").await
    }

    /// Boost a status
    pub async fn reblog(&self, id: &str) -> Result<Status> {
        self.status_action(id, "reblog").await
    }

    /// Undo a boost
    pub async fn unreblog(&self, id: &str) -> Result<Status> {
        self.status_action(id, "unreblog").await
    }

    async fn status_action(&self, id: &str, action: &str) -> Result<Status> {
        let path = format!("/api/v1/statuses/{}/{action}", segment("id", id)?);
        self.exec()
            .execute(&Request::post(path).authenticated())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use wiremock::matchers::{
        body_partial_json, header_exists, header_regex, method, path,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Mastodon {
        ClientBuilder::new(server.uri())
            .access_token("tok")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_post_never_reaches_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server).post(&NewStatus::new("")).await.unwrap_err();
        match err {
            Error::Validation { fields, .. } => assert_eq!(fields[0].field, "status"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let err = client(&server).toot("   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_media_only_post_is_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .and(body_partial_json(json!({"status": "", "media_ids": ["22"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::status("5", "")))
            .expect(1)
            .mount(&server)
            .await;

        let status = client(&server)
            .post(&NewStatus::new("").media("22"))
            .await
            .unwrap();
        assert_eq!(status.id, "5");
    }

    #[tokio::test]
    async fn test_toot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .and(body_partial_json(json!({"status": "hello"})))
            .and(header_exists("Idempotency-Key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(fixtures::status("109965842914424213", "hello")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let status = client(&server).toot("hello").await.unwrap();
        assert_eq!(status.content, "hello");
        assert!(!status.id.is_empty());
    }

    #[test]
    fn test_unknown_visibility_rejected() {
        let status = NewStatus::new("hi").visibility(Visibility::Unknown);
        assert!(matches!(status.validate(), Err(Error::Validation { .. })));
        assert!(NewStatus::new("hi").visibility(Visibility::Direct).validate().is_ok());
    }

    #[test]
    fn test_new_status_body() {
        let status = NewStatus::new("cw'd")
            .visibility(Visibility::Unlisted)
            .spoiler("spoilers")
            .sensitive(true)
            .language("en")
            .in_reply_to("9");
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "status": "cw'd",
                "visibility": "unlisted",
                "in_reply_to_id": "9",
                "spoiler_text": "spoilers",
                "sensitive": true,
                "language": "en"
            })
        );
        assert_eq!(
            serde_json::to_value(NewStatus::new("plain")).unwrap(),
            json!({"status": "plain"})
        );
    }

    #[tokio::test]
    async fn test_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/verify_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::account()))
            .expect(1)
            .mount(&server)
            .await;

        let me = client(&server).me().await.unwrap();
        assert_eq!(me.acct, "dunkyl");
    }

    #[tokio::test]
    async fn test_unauthenticated_me_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let anonymous = ClientBuilder::new(server.uri()).build().unwrap();
        let result = anonymous.me().await;
        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(Error::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_read_only_token_post_is_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                json!({"error": "This action is outside the authorized scopes"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).toot("hello").await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let server = MockServer::start().await;
        let mut deleted = fixtures::status("77", "<p>bye</p>");
        deleted["text"] = json!("bye");
        Mock::given(method("DELETE"))
            .and(path("/api/v1/statuses/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deleted))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/statuses/77"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "Record not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let status = client.delete("77").await.unwrap();
        assert_eq!(status.text.as_deref(), Some("bye"));
        assert!(matches!(client.delete("77").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_schedule() {
        let server = MockServer::start().await;
        let at = Utc::now() + ChronoDuration::hours(1);
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .and(body_partial_json(json!({"status": "later"})))
            .and(header_exists("Idempotency-Key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "3221",
                "scheduled_at": at.to_rfc3339(),
                "params": {"text": "later", "visibility": "public"},
                "media_attachments": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scheduled = client(&server)
            .schedule(&NewStatus::new("later"), at)
            .await
            .unwrap();
        assert_eq!(scheduled.id, "3221");
        assert_eq!(scheduled.params.text, "later");
        assert!(!scheduled.is_due());

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["scheduled_at"].is_string());
    }

    #[tokio::test]
    async fn test_schedule_in_past_rejected() {
        let server = MockServer::start().await;
        let err = client(&server)
            .schedule(&NewStatus::new("too late"), Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_scheduled_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/scheduled_statuses/3221"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).cancel_scheduled("3221").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_media_is_rebuilt_for_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/media"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/media"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(ResponseTemplate::new(202).set_body_json(fixtures::media("22")))
            .expect(1)
            .mount(&server)
            .await;

        let upload = MediaUpload::new("cat.png", "image/png", vec![0x89, b'P', b'N', b'G'])
            .description("a cat");
        let media = client(&server).upload_media(upload).await.unwrap();
        assert_eq!(media.id, "22");
        assert!(media.is_processed());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body = String::from_utf8_lossy(&requests[1].body);
        assert!(body.contains("filename=\"cat.png\""));
        assert!(body.contains("a cat"));
    }

    #[tokio::test]
    async fn test_favourite_and_reblog_paths() {
        let server = MockServer::start().await;
        for action in ["favourite", "unfavourite", "reblog", "unreblog"] {
            Mock::given(method("POST"))
                .and(path(format!("/api/v1/statuses/8/{action}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::status("8", "x")))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = client(&server);
        client.favourite("8").await.unwrap();
        client.unfavourite("8").await.unwrap();
        client.reblog("8").await.unwrap();
        client.unreblog("8").await.unwrap();
    }

    #[tokio::test]
    async fn test_home_timeline_requires_token() {
        let server = MockServer::start().await;
        let anonymous = ClientBuilder::new(server.uri()).build().unwrap();
        let err = anonymous.home_timeline(None).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_public_endpoints_through_deref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::status("3", "hi")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.is_authenticated());
        assert_eq!(client.status("3").await.unwrap().id, "3");
        client.close();
    }

    #[tokio::test]
    async fn test_media_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.MP4");
        std::fs::write(&file, b"not really a video").unwrap();

        let upload = MediaUpload::from_path(&file).await.unwrap();
        assert_eq!(upload.file_name, "clip.MP4");
        assert_eq!(upload.mime, "video/mp4");
        assert_eq!(upload.bytes.len(), 18);

        let voice = dir.path().join("memo.m4a");
        std::fs::write(&voice, b"").unwrap();
        assert_eq!(MediaUpload::from_path(&voice).await.unwrap().mime, "audio/m4a");

        let unknown = dir.path().join("blob");
        std::fs::write(&unknown, b"").unwrap();
        assert_eq!(
            MediaUpload::from_path(&unknown).await.unwrap().mime,
            "application/octet-stream"
        );
    }
}
