//! Inbound routing.
//!
//! # Data Flow
//! ```text
//! GET <proxy_root>/https://origin.test/page?x=1
//!     → root.rs (strip proxy root, re-attach query, validate)
//!     → ProxyTarget { raw, url }
//!     → fetch + rewrite
//!
//! Rewritten links:
//!     absolute URL → root.rs (prefix with proxy root) → browser
//! ```
//!
//! # Design Decisions
//! - The target is carried verbatim in the path; no percent-decoding, so
//!   `extract_target(generate(u)) == u` for every URL without a fragment
//! - Only http and https targets are fetched

pub mod root;

pub use root::{ProxyRoot, ProxyTarget, RoutingError};
