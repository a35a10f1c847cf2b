//! Raindrop.io REST client.
//!
//! Two operations: find the newest bookmark carrying the trigger tag, and take the
//! tag off again once the bookmark has been posted.

use std::time::Duration;

use dropskeet_common::BookmarkRecord;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::error::RaindropError;

/// Result of clearing the trigger tag. Clearing is idempotent: a bookmark that no
/// longer has the tag is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRemoval {
    Removed,
    AlreadyAbsent,
}

/// Where bookmarks come from.
pub trait BookmarkSource {
    /// Newest bookmark tagged `tag`, if any.
    fn latest_tagged(
        &self,
        tag: &str,
    ) -> impl Future<Output = Result<Option<BookmarkRecord>, RaindropError>> + Send;

    /// Remove `tag` from bookmark `id`, keeping its other tags.
    fn clear_tag(
        &self,
        id: i64,
        tag: &str,
    ) -> impl Future<Output = Result<TagRemoval, RaindropError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RaindropClient {
    client: reqwest::Client,
    api: Url,
    token: String,
}

#[derive(Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct ItemResponse {
    item: TaggedItem,
}

#[derive(Deserialize)]
struct TaggedItem {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    result: bool,
}

impl RaindropClient {
    pub fn new(api: Url, token: impl Into<String>, timeout: Duration) -> Result<Self, RaindropError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RaindropError::Client { source })?;
        Ok(Self {
            client,
            api,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api.as_str().trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RaindropError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| RaindropError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RaindropError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(RaindropError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| RaindropError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

impl BookmarkSource for RaindropClient {
    #[tracing::instrument(skip(self))]
    async fn latest_tagged(&self, tag: &str) -> Result<Option<BookmarkRecord>, RaindropError> {
        let endpoint = self.endpoint("raindrops/0");
        let search = json!([{ "key": "tag", "val": tag }]).to_string();
        let request = self.client.get(&endpoint).query(&[
            ("search", search.as_str()),
            ("sort", "-created"),
            ("perpage", "1"),
        ]);

        let response: ItemsResponse = self.send(&endpoint, request).await?;
        let Some(item) = response.items.into_iter().next() else {
            tracing::debug!("no bookmarks carry the tag");
            return Ok(None);
        };
        if item.get("_id").is_none() {
            tracing::warn!("first search result has no _id, ignoring it");
            return Ok(None);
        }

        let record: BookmarkRecord =
            serde_json::from_value(item).map_err(|source| RaindropError::Decode {
                endpoint: endpoint.clone(),
                source,
            })?;
        tracing::debug!(id = record.id, title = %record.title, "found tagged bookmark");
        Ok(Some(record))
    }

    #[tracing::instrument(skip(self))]
    async fn clear_tag(&self, id: i64, tag: &str) -> Result<TagRemoval, RaindropError> {
        let endpoint = self.endpoint(&format!("raindrop/{id}"));

        let current: ItemResponse = self.send(&endpoint, self.client.get(&endpoint)).await?;
        if !current.item.tags.iter().any(|t| t == tag) {
            tracing::info!("tag already absent");
            return Ok(TagRemoval::AlreadyAbsent);
        }

        let remaining: Vec<String> = current
            .item
            .tags
            .into_iter()
            .filter(|t| t != tag)
            .collect();
        let kept = remaining.len();
        let request = self
            .client
            .put(&endpoint)
            .json(&json!({ "tags": remaining }));
        let raw: Value = self.send(&endpoint, request).await?;

        let update: UpdateResponse =
            serde_json::from_value(raw.clone()).map_err(|source| RaindropError::Decode {
                endpoint: endpoint.clone(),
                source,
            })?;
        if !update.result {
            return Err(RaindropError::UpdateRejected {
                id,
                response: raw.to_string(),
            });
        }

        tracing::info!(remaining = kept, "removed tag");
        Ok(TagRemoval::Removed)
    }
}
