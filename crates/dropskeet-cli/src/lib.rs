//! dropskeet: post the newest tagged Raindrop bookmark to Bluesky.
//!
//! [`run::Poster::run_once`] drives one cycle against the [`raindrop`], [`bluesky`]
//! and [`alert`] collaborators. The binary wires them up from [`AppConfig`].

pub mod alert;
pub mod bluesky;
pub mod error;
pub mod raindrop;
pub mod run;

use dropskeet_common::AppConfig;
use dropskeet_renderer::{ComposerConfig, EmbedBuilder, EmbedConfig, TextComposer};

pub use crate::alert::{AlertSink, MailAlerter, MailConfig};
pub use crate::bluesky::{BlueskyClient, CreatedPost, PostingSink};
pub use crate::error::{AlertError, BlueskyError, DropskeetError, RaindropError, Result};
pub use crate::raindrop::{BookmarkSource, RaindropClient, TagRemoval};
pub use crate::run::{Poster, RunOutcome};

pub type LivePoster = Poster<RaindropClient, BlueskyClient, MailAlerter>;

/// Build the production poster from configuration.
pub fn poster_from_config(config: &AppConfig) -> Result<LivePoster> {
    let source = RaindropClient::new(
        config.raindrop_api.clone(),
        config.raindrop_token.clone(),
        config.http_timeout,
    )?;
    let sink = BlueskyClient::new(
        config.bluesky_service.clone(),
        config.bluesky_identifier.clone(),
        config.bluesky_password.clone(),
        config.http_timeout,
    )?;
    let alerts = MailAlerter::new(MailConfig::from(config));
    let composer = TextComposer::new(ComposerConfig::from(config));
    let embeds = EmbedBuilder::new(EmbedConfig::from(config))?;

    Ok(Poster::new(
        source,
        sink,
        alerts,
        composer,
        embeds,
        config.skeet_tag.clone(),
    ))
}
