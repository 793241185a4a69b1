//! Rewriting reverse proxy library.
//!
//! Targets are addressed through the proxy as `<root>/<absolute URL>`.
//! Responses come back with every URL in their headers, HTML and CSS
//! pointed through the proxy again, so navigation never leaves it.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::{DispatchError, RewriteError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::ProxyRoot;
