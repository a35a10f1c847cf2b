//! Tracing setup for the dropskeet binary.
//!
//! Console output only. The filter comes from `RUST_LOG` when set, otherwise from the
//! configured `LOG_LEVEL`, otherwise INFO (DEBUG in debug builds).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub fallback_filter: Option<String>,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// Build config for `service_name`. `fallback_filter` is the configured
    /// `LOG_LEVEL`, used when `RUST_LOG` is unset.
    pub fn new(service_name: impl Into<String>, fallback_filter: Option<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            fallback_filter: fallback_filter.filter(|v| !v.trim().is_empty()),
            console_level,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| match &self.fallback_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(self.console_level.as_str().to_lowercase())),
            None => EnvFilter::new(self.console_level.as_str().to_lowercase()),
        })
    }
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init(config: TelemetryConfig) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(config.filter());

    // try_init so a second call (tests, embedding) doesn't panic
    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!(service = %config.service_name, "telemetry initialized");
    }
}
