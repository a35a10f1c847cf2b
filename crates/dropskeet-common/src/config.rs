use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// How the cover image is attached to the post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmbedStyle {
    /// `app.bsky.embed.images` with a single image
    #[default]
    Image,
    /// `app.bsky.embed.external` card with the image as its thumbnail
    LinkPreview,
}

impl FromStr for EmbedStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "link-preview" | "link_preview" | "external" => Ok(Self::LinkPreview),
            other => Err(format!("expected `image` or `link-preview`, got `{other}`")),
        }
    }
}

/// Geometric normalization applied to the cover image. Only one is active per
/// deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryPolicy {
    /// Shrink to fit inside the box, keeping the aspect ratio. Never upscales.
    Fit { max_width: u32, max_height: u32 },
    /// Center-crop to `aspect_ratio` (width / height), then shrink to fit the box.
    Crop {
        aspect_ratio: f32,
        max_width: u32,
        max_height: u32,
    },
}

impl GeometryPolicy {
    pub const DEFAULT_MAX_SIDE: u32 = 1000;
    /// Link-card ratio used by most preview renderers
    pub const LINK_CARD_RATIO: f32 = 1.91;

    pub fn fit() -> Self {
        Self::Fit {
            max_width: Self::DEFAULT_MAX_SIDE,
            max_height: Self::DEFAULT_MAX_SIDE,
        }
    }

    pub fn crop() -> Self {
        Self::Crop {
            aspect_ratio: Self::LINK_CARD_RATIO,
            max_width: Self::DEFAULT_MAX_SIDE,
            max_height: Self::DEFAULT_MAX_SIDE,
        }
    }

    pub fn max_box(&self) -> (u32, u32) {
        match *self {
            Self::Fit {
                max_width,
                max_height,
            }
            | Self::Crop {
                max_width,
                max_height,
                ..
            } => (max_width, max_height),
        }
    }
}

impl Default for GeometryPolicy {
    fn default() -> Self {
        Self::fit()
    }
}

impl FromStr for GeometryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fit" => Ok(Self::fit()),
            "crop" => Ok(Self::crop()),
            other => Err(format!("expected `fit` or `crop`, got `{other}`")),
        }
    }
}

/// Encoding used for the uploaded image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("expected `jpeg` or `png`, got `{other}`")),
        }
    }
}

/// Everything the binary needs, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub raindrop_token: String,
    pub raindrop_api: Url,
    /// Tag marking bookmarks that should be posted
    pub skeet_tag: String,

    pub bluesky_identifier: String,
    pub bluesky_password: String,
    pub bluesky_service: Url,

    pub admin_email: String,
    pub smtp_login: String,
    pub smtp_password: String,
    pub smtp_server: String,
    pub smtp_port: u16,

    /// Maximum post length in graphemes
    pub post_budget: usize,
    pub http_timeout: Duration,
    /// Base URL of the page snapshot service used when the cover can't be fetched
    pub render_service: Option<Url>,
    pub embed_style: EmbedStyle,
    pub image_policy: GeometryPolicy,
    pub image_format: OutputFormat,
    /// Upload ceiling in bytes. `None` disables the shrink loop.
    pub image_max_bytes: Option<usize>,
    pub log_level: Option<String>,
}

impl AppConfig {
    pub const DEFAULT_RAINDROP_API: &'static str = "https://api.raindrop.io/rest/v1";
    pub const DEFAULT_BLUESKY_SERVICE: &'static str = "https://bsky.social";
    pub const DEFAULT_TAG: &'static str = "toskeet";
    pub const DEFAULT_POST_BUDGET: usize = 300;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
    /// Bluesky's blob limit for images
    pub const DEFAULT_IMAGE_MAX_BYTES: usize = 976_560;

    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `RAINDROP_TOKEN`: Raindrop API bearer token
    /// - `BLUESKY_IDENTIFIER`, `BLUESKY_PASSWORD`: handle and app password
    /// - `ADMIN_EMAIL`: alert recipient
    /// - `SMTP_LOGIN`, `SMTP_PASSWORD`, `SMTP_SERVER`, `SMTP_PORT`: alert mailer
    ///
    /// Optional env vars:
    /// - `RAINDROP_API_URL` (default: https://api.raindrop.io/rest/v1)
    /// - `BLUESKY_SERVICE` (default: https://bsky.social)
    /// - `SKEET_TAG` (default: toskeet)
    /// - `POST_BUDGET` (default: 300)
    /// - `HTTP_TIMEOUT_SECS` (default: 15)
    /// - `RENDER_SERVICE_URL` (default: unset, no fallback render)
    /// - `EMBED_STYLE`: `image` or `link-preview` (default: image)
    /// - `IMAGE_POLICY`: `fit` or `crop` (default: fit)
    /// - `IMAGE_FORMAT`: `jpeg` or `png` (default: jpeg)
    /// - `IMAGE_MAX_BYTES` (default: 976560, `0` disables)
    /// - `LOG_LEVEL`: fallback filter when `RUST_LOG` is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::MissingEnv { var: key });

        let raindrop_api = parse_url(
            &var("RAINDROP_API_URL").unwrap_or_else(|| Self::DEFAULT_RAINDROP_API.to_string()),
        )?;
        let bluesky_service = parse_url(
            &var("BLUESKY_SERVICE").unwrap_or_else(|| Self::DEFAULT_BLUESKY_SERVICE.to_string()),
        )?;
        let render_service = var("RENDER_SERVICE_URL")
            .map(|raw| parse_url(&raw))
            .transpose()?;

        let smtp_port = parse_field("SMTP_PORT", &required("SMTP_PORT")?)?;
        let post_budget = var("POST_BUDGET")
            .map(|raw| parse_field("POST_BUDGET", &raw))
            .transpose()?
            .unwrap_or(Self::DEFAULT_POST_BUDGET);
        let timeout_secs: u64 = var("HTTP_TIMEOUT_SECS")
            .map(|raw| parse_field("HTTP_TIMEOUT_SECS", &raw))
            .transpose()?
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        let image_max_bytes: usize = var("IMAGE_MAX_BYTES")
            .map(|raw| parse_field("IMAGE_MAX_BYTES", &raw))
            .transpose()?
            .unwrap_or(Self::DEFAULT_IMAGE_MAX_BYTES);

        Ok(Self {
            raindrop_token: required("RAINDROP_TOKEN")?,
            raindrop_api,
            skeet_tag: var("SKEET_TAG").unwrap_or_else(|| Self::DEFAULT_TAG.to_string()),
            bluesky_identifier: required("BLUESKY_IDENTIFIER")?,
            bluesky_password: required("BLUESKY_PASSWORD")?,
            bluesky_service,
            admin_email: required("ADMIN_EMAIL")?,
            smtp_login: required("SMTP_LOGIN")?,
            smtp_password: required("SMTP_PASSWORD")?,
            smtp_server: required("SMTP_SERVER")?,
            smtp_port,
            post_budget,
            http_timeout: Duration::from_secs(timeout_secs),
            render_service,
            embed_style: var("EMBED_STYLE")
                .map(|raw| parse_field("EMBED_STYLE", &raw))
                .transpose()?
                .unwrap_or_default(),
            image_policy: var("IMAGE_POLICY")
                .map(|raw| parse_field("IMAGE_POLICY", &raw))
                .transpose()?
                .unwrap_or_default(),
            image_format: var("IMAGE_FORMAT")
                .map(|raw| parse_field("IMAGE_FORMAT", &raw))
                .transpose()?
                .unwrap_or_default(),
            image_max_bytes: (image_max_bytes > 0).then_some(image_max_bytes),
            log_level: var("LOG_LEVEL"),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::UrlParse {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        message: e.to_string(),
    })
}
