//! Minimal Bluesky XRPC client: log in, upload the embed image, create the post.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use dropskeet_common::{ComposedPost, EmbedDescriptor, Facet, ImageEmbed};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::BlueskyError;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Where composed posts go.
pub trait PostingSink {
    fn post(
        &self,
        post: &ComposedPost,
        embed: Option<&EmbedDescriptor>,
    ) -> impl Future<Output = Result<CreatedPost, BlueskyError>> + Send;
}

/// Reference to a freshly created post record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPost {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub did: String,
    #[serde(default)]
    pub handle: String,
}

#[derive(Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct UploadBlobOutput {
    blob: Value,
}

#[derive(Serialize)]
struct CreateRecordInput<'a> {
    repo: &'a str,
    collection: &'a str,
    record: PostRecord<'a>,
}

/// `app.bsky.feed.post` record as sent over the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub facets: &'a [Facet],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
    pub created_at: String,
}

impl<'a> PostRecord<'a> {
    pub fn new(post: &'a ComposedPost, embed: Option<Value>, created_at: String) -> Self {
        Self {
            kind: POST_COLLECTION,
            text: &post.text,
            facets: &post.facets,
            embed,
            created_at,
        }
    }
}

#[derive(Deserialize, Default)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct BlueskyClient {
    client: reqwest::Client,
    service: Url,
    identifier: String,
    password: String,
}

impl BlueskyClient {
    pub fn new(
        service: Url,
        identifier: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BlueskyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BlueskyError::Client { source })?;
        Ok(Self {
            client,
            service,
            identifier: identifier.into(),
            password: password.into(),
        })
    }

    fn xrpc(&self, method: &str) -> String {
        format!(
            "{}/xrpc/{}",
            self.service.as_str().trim_end_matches('/'),
            method
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BlueskyError> {
        let response = request
            .send()
            .await
            .map_err(|source| BlueskyError::Request { method, source })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| BlueskyError::Request { method, source })?;

        if !status.is_success() {
            let XrpcErrorBody { error, message } =
                serde_json::from_slice(&body).unwrap_or_default();
            return Err(BlueskyError::Xrpc {
                method,
                status: status.as_u16(),
                error,
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|source| BlueskyError::Decode { method, source })
    }

    pub async fn create_session(&self) -> Result<Session, BlueskyError> {
        let request = self
            .client
            .post(self.xrpc(CREATE_SESSION))
            .json(&CreateSessionInput {
                identifier: &self.identifier,
                password: &self.password,
            });
        let session: Session = self.call(CREATE_SESSION, request).await?;
        tracing::debug!(did = %session.did, handle = %session.handle, "logged in");
        Ok(session)
    }

    /// Upload image bytes and return the blob ref to embed in a record.
    pub async fn upload_blob(
        &self,
        session: &Session,
        image: &ImageEmbed,
    ) -> Result<Value, BlueskyError> {
        let request = self
            .client
            .post(self.xrpc(UPLOAD_BLOB))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, &image.mime_type)
            .body(image.bytes.clone());
        let output: UploadBlobOutput = self.call(UPLOAD_BLOB, request).await?;
        tracing::debug!(len = image.bytes.len(), mime = %image.mime_type, "uploaded blob");
        Ok(output.blob)
    }

    pub async fn create_record(
        &self,
        session: &Session,
        record: PostRecord<'_>,
    ) -> Result<CreatedPost, BlueskyError> {
        let request = self
            .client
            .post(self.xrpc(CREATE_RECORD))
            .bearer_auth(&session.access_jwt)
            .json(&CreateRecordInput {
                repo: &session.did,
                collection: POST_COLLECTION,
                record,
            });
        self.call(CREATE_RECORD, request).await
    }
}

impl PostingSink for BlueskyClient {
    #[tracing::instrument(skip_all, fields(len = post.text.len(), facets = post.facets.len()))]
    async fn post(
        &self,
        post: &ComposedPost,
        embed: Option<&EmbedDescriptor>,
    ) -> Result<CreatedPost, BlueskyError> {
        let session = self.create_session().await?;

        let blob = match embed.and_then(EmbedDescriptor::image) {
            Some(image) => Some(self.upload_blob(&session, image).await?),
            None => None,
        };

        let embed = embed.and_then(|e| embed_value(e, blob));
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let created = self
            .create_record(&session, PostRecord::new(post, embed, created_at))
            .await?;
        tracing::info!(uri = %created.uri, "created post record");
        Ok(created)
    }
}

/// Record embed for `embed`, given the uploaded blob for its image. An image embed
/// without a blob has nothing to show and is dropped.
pub fn embed_value(embed: &EmbedDescriptor, blob: Option<Value>) -> Option<Value> {
    match embed {
        EmbedDescriptor::Image(image) => blob.map(|blob| {
            json!({
                "$type": "app.bsky.embed.images",
                "images": [{
                    "alt": image.alt_text,
                    "image": blob,
                    "aspectRatio": { "width": image.width, "height": image.height },
                }],
            })
        }),
        EmbedDescriptor::External(external) => {
            let mut card = json!({
                "uri": external.uri,
                "title": external.title,
                "description": external.description,
            });
            if let Some(blob) = blob {
                card["thumb"] = blob;
            }
            Some(json!({
                "$type": "app.bsky.embed.external",
                "external": card,
            }))
        }
    }
}
