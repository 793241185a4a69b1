//! Error types shared across the proxy.

use thiserror::Error;

/// Errors raised while rewriting a response body.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The rewritten document can't be represented in its declared charset.
    #[error("rewritten document is not representable in {charset}")]
    Encoding { charset: &'static str },

    /// The parser gave up on the input. Never leaves a rewriter; callers
    /// fall back to the original content.
    #[error("malformed content: {0}")]
    Parse(String),
}

/// Errors raised while dispatching an upstream response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The upstream body could not be read to completion.
    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),

    /// The body had to be buffered but exceeds the configured cap.
    #[error("upstream body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}
