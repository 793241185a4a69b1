//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick the log level from config, with `RUST_LOG` taking precedence
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Rewriter fallbacks log at `warn`, per-request detail at `debug`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("rewrite_proxy={level},tower_http={level}"))
        .unwrap_or_else(|_| EnvFilter::new("rewrite_proxy=info,tower_http=info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("debug").to_string(), "rewrite_proxy=debug,tower_http=debug");
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(default_filter("loud").to_string(), "rewrite_proxy=info,tower_http=info");
    }
}
