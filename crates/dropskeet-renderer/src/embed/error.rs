use miette::Diagnostic;
use thiserror::Error;

/// Reasons an image could not be turned into an embed. None of these reach the
/// caller of [`super::EmbedBuilder::build_embed`]; they decide whether the fallback
/// runs and what gets logged.
#[derive(Debug, Error, Diagnostic)]
pub enum EmbedError {
    #[error("failed to build HTTP client")]
    #[diagnostic(code(embed::client))]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed")]
    #[diagnostic(code(embed::fetch))]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    #[diagnostic(code(embed::status))]
    Status { url: String, status: u16 },

    #[error("{url} is not an image (content type `{content_type}`)")]
    #[diagnostic(code(embed::content_type))]
    ContentType { url: String, content_type: String },

    #[error("{url} is larger than {limit} bytes")]
    #[diagnostic(code(embed::too_large))]
    TooLarge { url: String, limit: usize },

    #[error("{url} returned an empty body")]
    #[diagnostic(code(embed::empty))]
    Empty { url: String },

    #[error("failed to decode image")]
    #[diagnostic(code(embed::decode))]
    Decode {
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image")]
    #[diagnostic(code(embed::encode))]
    Encode {
        #[source]
        source: image::ImageError,
    },

    #[error("no render service configured for fallback")]
    #[diagnostic(code(embed::no_fallback))]
    NoFallback,

    #[error("invalid fallback URL for {link}: {message}")]
    #[diagnostic(code(embed::fallback_url))]
    FallbackUrl { link: String, message: String },
}
