//! Post text composition.
//!
//! A post is `title`, the optional `[skeet_content: ...]` excerpt from the bookmark
//! note, and the percent-encoded link, one per line. Text over the budget is cut
//! before the link, never inside it, and the link facet is computed against the
//! final text.

use std::sync::LazyLock;

use dropskeet_common::{AppConfig, BookmarkRecord, ByteRange, ComposedPost, Facet};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

pub static SKEET_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[skeet_content:(.*?)\]").unwrap());

/// Everything except RFC 3986 unreserved characters and `:/?=` is escaped.
const LINK_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'=');

pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposerConfig {
    /// Maximum post length in graphemes
    pub budget: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            budget: AppConfig::DEFAULT_POST_BUDGET,
        }
    }
}

impl From<&AppConfig> for ComposerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            budget: config.post_budget,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextComposer {
    config: ComposerConfig,
}

impl TextComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Build the post body and its link facet. Never fails; bad input yields a
    /// degenerate post.
    #[tracing::instrument(level = "debug", skip_all, fields(id = record.id))]
    pub fn compose(&self, record: &BookmarkRecord) -> ComposedPost {
        let title = record.title.trim();
        let link = encode_link(record.link.trim());
        let excerpt = extract_note(&record.note);

        let joined = [title, excerpt.as_str(), link.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let text = fit_to_budget(joined, &link, self.config.budget);
        let facets = link_facets(&text, &link);

        if facets.is_empty() {
            tracing::warn!("link not found in composed text, posting without facets");
        }

        ComposedPost { text, facets }
    }
}

/// Text of the first `[skeet_content: ...]` marker in `note`, trimmed. Empty when
/// there is no marker.
pub fn extract_note(note: &str) -> String {
    SKEET_CONTENT_RE
        .captures(note)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

pub fn encode_link(link: &str) -> String {
    utf8_percent_encode(link, LINK_SAFE).to_string()
}

pub fn grapheme_len(s: &str) -> usize {
    s.graphemes(true).count()
}

/// Longest prefix of `s` holding at most `n` graphemes.
pub(crate) fn take_graphemes(s: &str, n: usize) -> &str {
    match s.grapheme_indices(true).nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shorten `text` to `budget` graphemes, keeping the last occurrence of `link`
/// intact at the end.
///
/// A link longer than the budget on its own wins over the budget.
pub fn fit_to_budget(text: String, link: &str, budget: usize) -> String {
    let len = grapheme_len(&text);
    if len <= budget {
        return text;
    }

    let position = if link.is_empty() {
        None
    } else {
        text.rfind(link)
    };

    let fitted = match position {
        Some(idx) => {
            let head = text[..idx].trim_end();
            // room for the ellipsis and the newline before the link
            let room = budget.saturating_sub(grapheme_len(link) + ELLIPSIS.len() + 1);
            let head = take_graphemes(head, room).trim_end();
            if head.is_empty() {
                link.to_string()
            } else {
                format!("{head}{ELLIPSIS}\n{link}")
            }
        }
        None => {
            let head = take_graphemes(&text, budget.saturating_sub(ELLIPSIS.len())).trim_end();
            format!("{head}{ELLIPSIS}")
        }
    };

    let fitted_len = grapheme_len(&fitted);
    if fitted_len > budget {
        tracing::warn!(budget, len = fitted_len, "link alone exceeds the post budget");
    } else {
        tracing::debug!(from = len, to = fitted_len, budget, "truncated post text");
    }

    fitted
}

/// One link facet over the last occurrence of `link` in `text`, or none.
pub fn link_facets(text: &str, link: &str) -> Vec<Facet> {
    if link.is_empty() {
        return Vec::new();
    }
    text.rfind(link)
        .map(|start| Facet::link(ByteRange::new(start, start + link.len()), link))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropskeet_common::FacetFeature;

    fn record(title: &str, note: &str, link: &str) -> BookmarkRecord {
        BookmarkRecord::new(1, title, link).with_note(note)
    }

    fn compose(title: &str, note: &str, link: &str) -> ComposedPost {
        TextComposer::default().compose(&record(title, note, link))
    }

    fn assert_facet_covers_link(post: &ComposedPost, link: &str) {
        assert_eq!(post.facets.len(), 1);
        let facet = &post.facets[0];
        assert_eq!(facet.slice(&post.text), Some(link));
        assert_eq!(
            facet.features,
            vec![FacetFeature::Link {
                uri: link.to_string()
            }]
        );
    }

    #[test]
    fn test_extract_note() {
        assert_eq!(
            extract_note("before [skeet_content:  worth a read ] after"),
            "worth a read"
        );
    }

    #[test]
    fn test_extract_note_missing_marker() {
        assert_eq!(extract_note(""), "");
        assert_eq!(extract_note("just a note"), "");
        assert_eq!(extract_note("[SKEET_CONTENT: shouting]"), "");
        assert_eq!(extract_note("[skeet_content: never closed"), "");
    }

    #[test]
    fn test_extract_note_multiline() {
        let note = "private stuff\n[skeet_content: line one\nline two\n]\nmore private";
        assert_eq!(extract_note(note), "line one\nline two");
    }

    #[test]
    fn test_extract_note_first_marker_wins() {
        let note = "[skeet_content: first] [skeet_content: second]";
        assert_eq!(extract_note(note), "first");
    }

    #[test]
    fn test_encode_link_keeps_url_structure() {
        assert_eq!(
            encode_link("https://example.com/a/b?x=1"),
            "https://example.com/a/b?x=1"
        );
        assert_eq!(
            encode_link("https://example.com/café?q=ü"),
            "https://example.com/caf%C3%A9?q=%C3%BC"
        );
        assert_eq!(
            encode_link("https://example.com/a b"),
            "https://example.com/a%20b"
        );
        assert_eq!(
            encode_link("https://example.com/~user/file-name_v1.2"),
            "https://example.com/~user/file-name_v1.2"
        );
    }

    #[test]
    fn test_no_excerpt_has_no_blank_line() {
        let post = compose("T", "", "https://e.co");
        insta::assert_snapshot!(post.text, @r"
        T
        https://e.co
        ");
        assert_eq!(post.text, "T\nhttps://e.co");
        assert_facet_covers_link(&post, "https://e.co");
    }

    #[test]
    fn test_title_excerpt_link() {
        let post = compose(
            "  Rust 1.85  ",
            "[skeet_content: edition 2024 is here]",
            " https://blog.rust-lang.org/ ",
        );
        assert_eq!(
            post.text,
            "Rust 1.85\nedition 2024 is here\nhttps://blog.rust-lang.org/"
        );
        assert_facet_covers_link(&post, "https://blog.rust-lang.org/");
    }

    #[test]
    fn test_link_only_post() {
        let post = compose("   ", "no marker here", "https://e.co/x");
        assert_eq!(post.text, "https://e.co/x");
        assert_eq!(post.facets[0].index, ByteRange::new(0, 14));
    }

    #[test]
    fn test_facet_byte_offsets_after_multibyte_text() {
        let post = compose("Hello → world", "", "https://example.com/x");
        assert_eq!(post.text, "Hello → world\nhttps://example.com/x");
        // "→" is three bytes, so the link starts at byte 16, not char 14
        assert_eq!(post.facets[0].index, ByteRange::new(16, 37));
        assert_facet_covers_link(&post, "https://example.com/x");
    }

    #[test]
    fn test_non_ascii_link_offsets_use_encoded_form() {
        let post = compose("Ünïcödé", "", "https://example.com/straße");
        let encoded = "https://example.com/stra%C3%9Fe";
        assert!(post.text.ends_with(encoded));
        assert_facet_covers_link(&post, encoded);
    }

    #[test]
    fn test_truncation_keeps_link_intact() {
        let link = "https://example.com/x";
        let title = "a".repeat(400);
        let post = compose(&title, "", link);

        assert_eq!(grapheme_len(&post.text), 300);
        assert!(post.text.ends_with(&format!("...\n{link}")));
        assert!(post.text.starts_with(&"a".repeat(275)));
        assert_facet_covers_link(&post, link);
    }

    #[test]
    fn test_truncation_counts_graphemes_not_bytes() {
        let link = "https://example.com/x";
        let title = "→".repeat(200);
        let excerpt = format!("[skeet_content: {}]", "👨‍👩‍👧".repeat(200));
        let post = compose(&title, &excerpt, link);

        assert_eq!(grapheme_len(&post.text), 300);
        assert!(post.text.ends_with(link));
        assert_facet_covers_link(&post, link);
    }

    #[test]
    fn test_text_at_budget_is_untouched() {
        let link = "https://e.co";
        // 287 + 1 newline + 12 link = 300
        let title = "b".repeat(287);
        let post = compose(&title, "", link);
        assert_eq!(post.text, format!("{title}\n{link}"));
    }

    #[test]
    fn test_custom_budget() {
        let composer = TextComposer::new(ComposerConfig { budget: 40 });
        let post = composer.compose(&record(
            "A rather long title that will not fit",
            "[skeet_content: and an excerpt]",
            "https://e.co/abc",
        ));
        assert!(grapheme_len(&post.text) <= 40);
        assert!(post.text.ends_with("...\nhttps://e.co/abc"));
        assert_facet_covers_link(&post, "https://e.co/abc");
    }

    #[test]
    fn test_link_longer_than_budget() {
        let link = format!("https://example.com/{}", "p".repeat(50));
        let composer = TextComposer::new(ComposerConfig { budget: 30 });
        let post = composer.compose(&record("title", "", &link));
        assert_eq!(post.text, link);
        assert_facet_covers_link(&post, &link);
    }

    #[test]
    fn test_fit_without_link_truncates_everything() {
        let text = "x".repeat(50);
        let fitted = fit_to_budget(text, "https://missing.example", 20);
        assert_eq!(fitted, format!("{}...", "x".repeat(17)));
    }

    #[test]
    fn test_facets_empty_when_link_absent() {
        assert!(link_facets("no link in here", "https://e.co").is_empty());
        assert!(link_facets("anything", "").is_empty());
    }

    #[test]
    fn test_facet_targets_trailing_link_when_repeated() {
        let text = "see https://e.co\nhttps://e.co";
        let facets = link_facets(text, "https://e.co");
        assert_eq!(facets[0].index, ByteRange::new(17, 29));
    }
}
