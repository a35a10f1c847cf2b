use bytes::{Bytes, BytesMut};
use mime_sniffer::MimeTypeSniffer;
use reqwest::header::CONTENT_TYPE;

use super::error::EmbedError;

/// Sites regularly refuse reqwest's default agent, so image requests go out looking
/// like a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// GET `url` and accept the body only if it is a non-empty image of at most
/// `max_bytes` bytes.
///
/// The declared content type decides; the body is sniffed only when the server
/// sends no content type at all. The size cap is checked against `Content-Length`
/// up front and again while the body streams in.
#[tracing::instrument(level = "debug", skip(client))]
pub async fn fetch_image(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<Bytes, EmbedError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|source| EmbedError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(EmbedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let declared = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    if let Some(content_type) = &declared {
        if !content_type.starts_with("image/") {
            return Err(EmbedError::ContentType {
                url: url.to_string(),
                content_type: content_type.clone(),
            });
        }
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(EmbedError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|source| EmbedError::Fetch {
        url: url.to_string(),
        source,
    })? {
        if body.len() + chunk.len() > max_bytes {
            return Err(EmbedError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
        body.extend_from_slice(&chunk);
    }
    let bytes = body.freeze();

    if bytes.is_empty() {
        return Err(EmbedError::Empty {
            url: url.to_string(),
        });
    }

    let content_type = match declared {
        Some(content_type) => content_type,
        None => {
            let sniffed = bytes
                .sniff_mime_type()
                .unwrap_or("application/octet-stream");
            if !sniffed.starts_with("image/") {
                return Err(EmbedError::ContentType {
                    url: url.to_string(),
                    content_type: sniffed.to_string(),
                });
            }
            sniffed.to_string()
        }
    };

    tracing::debug!(%content_type, len = bytes.len(), "fetched image");
    Ok(bytes)
}
