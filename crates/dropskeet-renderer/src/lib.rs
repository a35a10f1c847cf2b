//! dropskeet renderer
//!
//! Turns a bookmark into Bluesky post content: the text body with its link facet
//! ([`compose`]) and the cover image embed ([`embed`]).

pub mod compose;
pub mod embed;

pub use compose::{ComposerConfig, TextComposer, encode_link, extract_note};
pub use embed::{EmbedBuilder, EmbedConfig, EmbedError};
