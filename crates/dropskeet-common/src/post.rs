//! Post content handed from the renderer to the Bluesky client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Byte span into the UTF-8 encoding of the post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    pub byte_start: usize,
    pub byte_end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            byte_start: start,
            byte_end: end,
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.byte_start..self.byte_end
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start >= self.byte_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

/// Rich-text annotation over a byte span of the post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteRange,
    pub features: Vec<FacetFeature>,
}

impl Facet {
    pub fn link(index: ByteRange, uri: impl Into<String>) -> Self {
        Self {
            index,
            features: vec![FacetFeature::Link { uri: uri.into() }],
        }
    }

    /// The text this facet covers, or `None` if the span is out of bounds or not on
    /// a char boundary.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        if self.index.is_empty() {
            return None;
        }
        text.get(self.index.to_range())
    }
}

/// Final post body plus its annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPost {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// Transcoded image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEmbed {
    pub bytes: Bytes,
    pub mime_type: String,
    /// Also used as the file name
    pub alt_text: String,
    pub width: u32,
    pub height: u32,
}

/// Link card with an optional thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLinkEmbed {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<ImageEmbed>,
}

/// Media attached to a post. A post without media carries no descriptor at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedDescriptor {
    Image(ImageEmbed),
    External(ExternalLinkEmbed),
}

impl EmbedDescriptor {
    /// The image that has to be uploaded as a blob before posting, if any.
    pub fn image(&self) -> Option<&ImageEmbed> {
        match self {
            Self::Image(image) => Some(image),
            Self::External(external) => external.thumbnail.as_ref(),
        }
    }
}
