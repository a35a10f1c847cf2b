use dropskeet_common::ConfigError;
use dropskeet_renderer::EmbedError;
use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a dropskeet run
#[derive(Debug, Error, Diagnostic)]
pub enum DropskeetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Raindrop(#[from] RaindropError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bluesky(#[from] BlueskyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),
}

/// Raindrop REST API errors
#[derive(Debug, Error, Diagnostic)]
pub enum RaindropError {
    #[error("failed to build Raindrop HTTP client")]
    #[diagnostic(code(raindrop::client))]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} failed")]
    #[diagnostic(code(raindrop::request))]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    #[diagnostic(
        code(raindrop::status),
        help("A 401 usually means RAINDROP_TOKEN is wrong or expired")
    )]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}")]
    #[diagnostic(code(raindrop::decode))]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Raindrop refused to update tags for bookmark {id}: {response}")]
    #[diagnostic(code(raindrop::update_rejected))]
    UpdateRejected { id: i64, response: String },
}

/// Bluesky XRPC errors
#[derive(Debug, Error, Diagnostic)]
pub enum BlueskyError {
    #[error("failed to build Bluesky HTTP client")]
    #[diagnostic(code(bluesky::client))]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("XRPC call {method} failed")]
    #[diagnostic(code(bluesky::request))]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("XRPC call {method} returned HTTP {status}: {error}: {message}")]
    #[diagnostic(code(bluesky::xrpc))]
    Xrpc {
        method: &'static str,
        status: u16,
        error: String,
        message: String,
    },

    #[error("unexpected response from {method}")]
    #[diagnostic(code(bluesky::decode))]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Error alert mail errors
#[derive(Debug, Error, Diagnostic)]
pub enum AlertError {
    #[error("invalid email address `{address}`")]
    #[diagnostic(code(alert::address), help("check ADMIN_EMAIL and SMTP_LOGIN"))]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build alert email")]
    #[diagnostic(code(alert::build))]
    Build {
        #[source]
        source: lettre::error::Error,
    },

    #[error("SMTP delivery failed")]
    #[diagnostic(code(alert::transport))]
    Transport {
        #[source]
        source: lettre::transport::smtp::Error,
    },
}

/// `error: cause: cause` for alert bodies, which only carry plain text.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

pub type Result<T> = std::result::Result<T, DropskeetError>;
