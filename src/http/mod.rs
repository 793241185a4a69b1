//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → routing (recover target URL from the path)
//!     → request.rs (strip headers, build upstream request)
//!     → client.rs (fetch from origin)
//!     → rewrite (headers + body by content type)
//!     → response.rs (finalize headers)
//!     → Send to client
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;

pub use client::{FetchError, HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
