//! Inbound request preparation.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) as early as possible
//! - Strip headers that must not reach the origin
//! - Build the [`UpstreamRequest`] for the fetch collaborator
//!
//! # Design Decisions
//! - `Host` is dropped; the client derives it from the target URL
//! - `Accept-Encoding` is dropped so HTML and CSS arrive uncompressed and
//!   can be rewritten
//! - Hop-by-hop headers, including those named by `Connection`, are dropped

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, Method};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use url::Url;

use crate::http::client::UpstreamRequest;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Layer assigning an `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer copying the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Strip hop-by-hop headers, including the ones listed in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Build the request forwarded to `target`.
pub fn forward_request(method: Method, target: Url, mut headers: HeaderMap, body: Bytes) -> UpstreamRequest {
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::ACCEPT_ENCODING);

    UpstreamRequest {
        method,
        url: target,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forward_strips_host_and_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-secret"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=123"));

        let target = Url::parse("https://google.com/").unwrap();
        let request = forward_request(Method::GET, target, headers, Bytes::new());

        assert_eq!(request.url.as_str(), "https://google.com/");
        assert!(request.headers.get(header::HOST).is_none());
        assert!(request.headers.get(header::CONNECTION).is_none());
        assert!(request.headers.get("x-secret").is_none());
        assert!(request.headers.get(header::ACCEPT_ENCODING).is_none());
        assert_eq!(request.headers[header::ACCEPT], "text/html");
        assert_eq!(request.headers[header::COOKIE], "session=123");
    }
}
