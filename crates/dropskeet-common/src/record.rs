use serde::{Deserialize, Deserializer, Serialize};

/// A Raindrop bookmark, as far as posting is concerned.
///
/// Only `link` is required; everything else defaults to empty so a sparse API
/// response still produces a (degenerate) post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub note: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cover: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BookmarkRecord {
    pub fn new(id: i64, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            link: link.into(),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into()).filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Cover URL, if the bookmark has a non-blank one.
    pub fn cover_url(&self) -> Option<&str> {
        self.cover
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}
