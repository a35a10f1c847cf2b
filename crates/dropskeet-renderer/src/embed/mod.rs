//! Cover image embeds.
//!
//! Fetch the bookmark's cover, fall back to a rendered snapshot of the article when
//! the cover is unusable, normalize the image and wrap it as an image embed or a
//! link card. Every failure along the way ends in "no embed", never an error.

mod error;
mod fetch;
mod transcode;

use std::time::Duration;

use bytes::Bytes;
use dropskeet_common::{
    AppConfig, BookmarkRecord, EmbedDescriptor, EmbedStyle, ExternalLinkEmbed, ImageEmbed,
};
use image::DynamicImage;
use url::Url;

use crate::compose::{ELLIPSIS, encode_link, grapheme_len, take_graphemes};

pub use error::EmbedError;
pub use fetch::{BROWSER_USER_AGENT, fetch_image};
pub use transcode::{
    TranscodeOptions, Transcoded, apply_geometry, center_crop, decode, encode, file_name_for,
    fit_within, transcode,
};

#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Per-request timeout for both the cover and the fallback fetch
    pub timeout: Duration,
    pub user_agent: String,
    /// Snapshot service queried as `{render_service}/render/{article link}`
    pub render_service: Option<Url>,
    pub style: EmbedStyle,
    pub transcode: TranscodeOptions,
    /// Downloads larger than this are abandoned before decoding
    pub max_download_bytes: usize,
    /// Link card descriptions are cut to this many graphemes
    pub description_limit: usize,
}

impl EmbedConfig {
    pub const DEFAULT_DESCRIPTION_LIMIT: usize = 100;
    pub const DEFAULT_MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(AppConfig::DEFAULT_TIMEOUT_SECS),
            user_agent: BROWSER_USER_AGENT.to_string(),
            render_service: None,
            style: EmbedStyle::default(),
            transcode: TranscodeOptions {
                max_bytes: Some(AppConfig::DEFAULT_IMAGE_MAX_BYTES),
                ..Default::default()
            },
            max_download_bytes: Self::DEFAULT_MAX_DOWNLOAD_BYTES,
            description_limit: Self::DEFAULT_DESCRIPTION_LIMIT,
        }
    }
}

impl From<&AppConfig> for EmbedConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: config.http_timeout,
            render_service: config.render_service.clone(),
            style: config.embed_style,
            transcode: TranscodeOptions {
                geometry: config.image_policy,
                format: config.image_format,
                max_bytes: config.image_max_bytes,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedBuilder {
    client: reqwest::Client,
    config: EmbedConfig,
}

impl EmbedBuilder {
    pub fn new(config: EmbedConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| EmbedError::Client { source })?;
        Ok(Self { client, config })
    }

    /// Build the embed for `cover_url`. `None` means post without media.
    #[tracing::instrument(skip(self, record), fields(id = record.id))]
    pub async fn build_embed(
        &self,
        cover_url: &str,
        record: &BookmarkRecord,
    ) -> Option<EmbedDescriptor> {
        let image = match self.load_image(cover_url, record).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, "no embeddable image, posting without embed");
                return None;
            }
        };

        let image = match self.image_embed(image, cover_url) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, "failed to transcode cover image, posting without embed");
                return None;
            }
        };

        tracing::info!(
            alt = %image.alt_text,
            width = image.width,
            height = image.height,
            len = image.bytes.len(),
            "prepared cover image"
        );

        Some(match self.config.style {
            EmbedStyle::Image => EmbedDescriptor::Image(image),
            EmbedStyle::LinkPreview => EmbedDescriptor::External(ExternalLinkEmbed {
                uri: encode_link(record.link.trim()),
                title: record.title.trim().to_string(),
                description: preview_description(&record.excerpt, self.config.description_limit),
                thumbnail: Some(image),
            }),
        })
    }

    /// The cover if it is usable, otherwise the rendered snapshot of the article.
    async fn load_image(
        &self,
        cover_url: &str,
        record: &BookmarkRecord,
    ) -> Result<DynamicImage, EmbedError> {
        match self.fetch_and_decode(cover_url).await {
            Ok(image) => Ok(image),
            Err(primary) => {
                tracing::warn!(url = cover_url, error = %primary, "cover image unavailable");
                let fallback = self.fallback_url(&record.link)?;
                tracing::info!(url = %fallback, "trying fallback render");
                self.fetch_and_decode(fallback.as_str()).await
            }
        }
    }

    async fn fetch_and_decode(&self, url: &str) -> Result<DynamicImage, EmbedError> {
        let bytes = fetch_image(&self.client, url, self.config.max_download_bytes).await?;
        decode(&bytes)
    }

    pub fn fallback_url(&self, link: &str) -> Result<Url, EmbedError> {
        let base = self
            .config
            .render_service
            .as_ref()
            .ok_or(EmbedError::NoFallback)?;
        let joined = format!(
            "{}/render/{}",
            base.as_str().trim_end_matches('/'),
            link.trim()
        );
        Url::parse(&joined).map_err(|e| EmbedError::FallbackUrl {
            link: link.to_string(),
            message: e.to_string(),
        })
    }

    fn image_embed(&self, image: DynamicImage, cover_url: &str) -> Result<ImageEmbed, EmbedError> {
        let options = &self.config.transcode;
        let transcoded = transcode(image, options)?;
        Ok(ImageEmbed {
            bytes: Bytes::from(transcoded.bytes),
            mime_type: options.format.mime_type().to_string(),
            alt_text: file_name_for(cover_url, options.format),
            width: transcoded.width,
            height: transcoded.height,
        })
    }
}

/// Excerpt for a link card, cut to `limit` graphemes with a trailing ellipsis.
pub fn preview_description(excerpt: &str, limit: usize) -> String {
    let excerpt = excerpt.trim();
    if grapheme_len(excerpt) <= limit {
        return excerpt.to_string();
    }
    format!("{}{ELLIPSIS}", take_graphemes(excerpt, limit).trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_description_short_excerpt_untouched() {
        assert_eq!(preview_description("  short  ", 100), "short");
        assert_eq!(preview_description("", 100), "");
    }

    #[test]
    fn test_preview_description_caps_length() {
        let excerpt = "word ".repeat(40);
        let description = preview_description(&excerpt, 100);
        assert!(description.ends_with("..."));
        assert_eq!(grapheme_len(&description), 99 + 3);
        insta::assert_snapshot!(preview_description("abcdefghij", 4), @"abcd...");
    }

    #[test]
    fn test_fallback_url() {
        let config = EmbedConfig {
            render_service: Some(Url::parse("https://render.example.com/").unwrap()),
            ..Default::default()
        };
        let builder = EmbedBuilder::new(config).unwrap();
        let url = builder.fallback_url(" https://blog.example.org/post ").unwrap();
        assert_eq!(
            url.as_str(),
            "https://render.example.com/render/https://blog.example.org/post"
        );
    }

    #[test]
    fn test_no_fallback_without_render_service() {
        let builder = EmbedBuilder::new(EmbedConfig::default()).unwrap();
        assert!(matches!(
            builder.fallback_url("https://e.co"),
            Err(EmbedError::NoFallback)
        ));
    }
}
