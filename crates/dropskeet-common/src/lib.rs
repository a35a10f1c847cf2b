//! Shared types for dropskeet.
//!
//! The bookmark record read from Raindrop, the post/facet/embed model handed to the
//! Bluesky client, environment configuration and tracing setup all live here so the
//! renderer and the binary agree on one shape for each.

pub mod config;
pub mod error;
pub mod post;
pub mod record;
pub mod telemetry;

pub use crate::config::{AppConfig, EmbedStyle, GeometryPolicy, OutputFormat};
pub use crate::error::ConfigError;
pub use crate::post::{
    ByteRange, ComposedPost, EmbedDescriptor, ExternalLinkEmbed, Facet, FacetFeature,
    ImageEmbed,
};
pub use crate::record::BookmarkRecord;
