//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// How proxy URLs are built and how much content is rewritten.
    pub rewrite: RewriteConfig,

    /// Upstream fetch settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests processed concurrently (backpressure).
    pub max_concurrent_requests: usize,

    /// Total time allowed per inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_concurrent_requests: 1024,
            request_timeout_secs: 60,
        }
    }
}

/// Rewriting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Path prefix proxy URLs live under ("" or "/prefix").
    pub proxy_root: String,

    /// Largest HTML or CSS body buffered for rewriting, in bytes.
    pub max_body_bytes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            proxy_root: String::new(),
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for a whole upstream exchange in seconds.
    pub request_secs: u64,

    /// Largest inbound request body forwarded upstream, in bytes.
    pub max_request_body_bytes: usize,

    /// User-Agent sent when the browser supplies none.
    pub user_agent: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            max_request_body_bytes: 2 * 1024 * 1024, // 2MB
            user_agent: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
