//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Bind server to listener and shut down gracefully
//! - Recover the target, fetch it, rewrite the response
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::client::{FetchError, HttpUpstream, Upstream};
use crate::http::request::{forward_request, propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::http::response::{bad_target, body_too_large, dispatch_failure, fetch_failure, into_client_response};
use crate::observability::metrics;
use crate::rewrite::{dispatch, CurrentContext};
use crate::routing::ProxyRoot;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: Arc<ProxyRoot>,
    pub upstream: Arc<dyn Upstream>,
    pub max_body_bytes: usize,
    pub max_request_body_bytes: usize,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server fetching through a reqwest client.
    pub fn new(config: ProxyConfig) -> Result<Self, FetchError> {
        let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
        Ok(Self::with_upstream(config, upstream))
    }

    /// Create a new HTTP server fetching through `upstream`.
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Self {
        let state = AppState {
            root: Arc::new(ProxyRoot::new(&config.rewrite.proxy_root)),
            upstream,
            max_body_bytes: config.rewrite.max_body_bytes,
            max_request_body_bytes: config.upstream.max_request_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            proxy_root = %self.config.rewrite.proxy_root,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Main proxy handler.
/// Recovers the target, fetches it and rewrites the response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let target = match state.root.extract_target(request.uri()) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "No proxy target");
            metrics::record_request(method.as_str(), 400, "none", start_time);
            return bad_target();
        }
    };

    tracing::debug!(method = %method, target = %target.url, "Proxying request");

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_request_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Request body rejected");
            metrics::record_request(method.as_str(), 413, "none", start_time);
            return body_too_large();
        }
    };

    let upstream_request = forward_request(parts.method, target.url.clone(), parts.headers, body);
    let response = match state.upstream.fetch(upstream_request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(target = %target.url, error = %e, "Upstream error");
            let response = fetch_failure(&e);
            metrics::record_request(method.as_str(), response.status().as_u16(), "none", start_time);
            return response;
        }
    };

    let ctx = CurrentContext::new(&target.raw, &*state.root);
    let proxied = match dispatch(response, &ctx, state.max_body_bytes).await {
        Ok(proxied) => proxied,
        Err(e) => {
            tracing::error!(target = %target.url, error = %e, "Failed to rewrite upstream response");
            metrics::record_request(method.as_str(), 502, "none", start_time);
            return dispatch_failure(&e);
        }
    };

    tracing::debug!(
        status = %proxied.status,
        content = proxied.kind.as_str(),
        "Upstream responded"
    );
    metrics::record_request(method.as_str(), proxied.status.as_u16(), proxied.kind.as_str(), start_time);

    into_client_response(proxied)
}
