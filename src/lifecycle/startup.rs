//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from the validated configuration
//! - Build the upstream client and server
//! - Bind the listener and begin accepting traffic
//! - Tie OS signals to graceful shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::{FetchError, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the proxy until a shutdown signal arrives.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        proxy_root = %config.rewrite.proxy_root,
        max_concurrent_requests = config.listener.max_concurrent_requests,
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
