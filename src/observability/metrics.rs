//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, rewrite fallbacks)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): total requests by method, status, content kind
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rewrite_fallbacks_total` (counter): bodies passed through because
//!   a rewriter gave up, by kind (html, css, inline_style)
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so the rewriters
//!   can record unconditionally
//! - Labels are low-cardinality; the target URL is never a label

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed proxy request.
pub fn record_request(method: &str, status: u16, content: &'static str, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "content" => content
    )
    .increment(1);
    metrics::histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "content" => content
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a body that was passed through because it could not be rewritten.
pub fn record_rewrite_fallback(kind: &'static str) {
    metrics::counter!("proxy_rewrite_fallbacks_total", "kind" => kind).increment(1);
}
