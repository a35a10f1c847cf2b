//! One polling cycle: fetch, compose, embed, post, clear the tag.
//!
//! Every failure after configuration is reported to the operator through the alert
//! sink. The tag is only cleared once the post exists, so a failed post is retried
//! on the next run.

use dropskeet_renderer::{EmbedBuilder, TextComposer};

use crate::alert::AlertSink;
use crate::bluesky::PostingSink;
use crate::error::{DropskeetError, Result, error_chain};
use crate::raindrop::{BookmarkSource, TagRemoval};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NothingToPost,
    Posted { uri: String, tag: TagRemoval },
}

pub struct Poster<S, P, A> {
    source: S,
    sink: P,
    alerts: A,
    composer: TextComposer,
    embeds: EmbedBuilder,
    tag: String,
}

impl<S, P, A> Poster<S, P, A>
where
    S: BookmarkSource,
    P: PostingSink,
    A: AlertSink,
{
    pub fn new(
        source: S,
        sink: P,
        alerts: A,
        composer: TextComposer,
        embeds: EmbedBuilder,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            source,
            sink,
            alerts,
            composer,
            embeds,
            tag: tag.into(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn alerts(&self) -> &A {
        &self.alerts
    }

    #[tracing::instrument(skip(self), fields(tag = %self.tag))]
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let record = match self.source.latest_tagged(&self.tag).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!("no new content to post");
                return Ok(RunOutcome::NothingToPost);
            }
            Err(e) => {
                let e = DropskeetError::from(e);
                self.alert(format!("An unexpected error occurred: {}", error_chain(&e)))
                    .await;
                return Err(e);
            }
        };
        tracing::info!(id = record.id, title = %record.title, "posting bookmark");

        let post = self.composer.compose(&record);
        let embed = match record.cover_url() {
            Some(cover) => self.embeds.build_embed(cover, &record).await,
            None => {
                tracing::debug!("bookmark has no cover, posting text only");
                None
            }
        };

        let created = match self.sink.post(&post, embed.as_ref()).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(error = %e, "failed to post to Bluesky, leaving tag in place");
                self.alert(format!("Failed to post to Bluesky: {}", error_chain(&e)))
                    .await;
                return Err(e.into());
            }
        };
        tracing::info!(uri = %created.uri, "posted to Bluesky");

        match self.source.clear_tag(record.id, &self.tag).await {
            Ok(tag) => {
                tracing::info!(id = record.id, ?tag, "cleared tag");
                Ok(RunOutcome::Posted {
                    uri: created.uri,
                    tag,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, id = record.id, "failed to clear tag after posting");
                self.alert(format!(
                    "Failed to remove '{}' tag from Raindrop: {}",
                    self.tag,
                    error_chain(&e)
                ))
                .await;
                Err(e.into())
            }
        }
    }

    /// Send an alert. Delivery failures are logged and swallowed.
    async fn alert(&self, message: String) {
        if let Err(e) = self.alerts.send_alert(&message).await {
            tracing::error!(error = %e, alert = %message, "failed to send error alert");
        }
    }
}
