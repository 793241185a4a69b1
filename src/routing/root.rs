//! Proxy root: encodes target URLs into proxy URLs and back.

use axum::http::Uri;
use thiserror::Error;
use url::Url;

use crate::rewrite::UrlGenerator;

/// Errors recovering a target URL from a request.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("request path is outside the proxy root")]
    OutsideRoot,

    #[error("request names no target URL")]
    MissingTarget,

    #[error("invalid target URL: {0}")]
    InvalidTarget(#[from] url::ParseError),

    #[error("unsupported target scheme: {0}")]
    UnsupportedScheme(String),
}

/// Target recovered from an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// The target exactly as it appeared in the request.
    pub raw: String,
    /// Parsed form handed to the upstream client.
    pub url: Url,
}

/// Path prefix under which target URLs are exposed.
#[derive(Debug, Clone, Default)]
pub struct ProxyRoot {
    prefix: String,
}

impl ProxyRoot {
    /// `prefix` is either empty or starts with `/`; a trailing `/` is ignored.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Recover the target URL from an inbound request URI.
    pub fn extract_target(&self, uri: &Uri) -> Result<ProxyTarget, RoutingError> {
        let rest = uri
            .path()
            .strip_prefix(self.prefix.as_str())
            .ok_or(RoutingError::OutsideRoot)?;
        let rest = rest.strip_prefix('/').ok_or(RoutingError::OutsideRoot)?;
        if rest.is_empty() {
            return Err(RoutingError::MissingTarget);
        }

        let raw = match uri.query() {
            Some(query) => format!("{}?{}", rest, query),
            None => rest.to_string(),
        };

        let url = Url::parse(&raw)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RoutingError::UnsupportedScheme(url.scheme().to_string()));
        }

        Ok(ProxyTarget { raw, url })
    }
}

impl UrlGenerator for ProxyRoot {
    fn generate(&self, absolute_url: &str) -> String {
        format!("{}/{}", self.prefix, absolute_url)
    }
}
