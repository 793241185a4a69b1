//! Response assembly.
//!
//! # Responsibilities
//! - Turn a [`ProxiedResponse`] into the response sent to the browser
//! - Strip hop-by-hop headers
//! - Default `Cache-Control` to `no-cache`
//! - Map failures to generic status codes without leaking detail
//!
//! # Design Decisions
//! - Streaming bodies stay streaming
//! - A non-canonical upstream reason phrase is forwarded on HTTP/1
//! - Upstream timeouts become 504, every other upstream failure 502

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::ext::ReasonPhrase;

use crate::error::DispatchError;
use crate::http::client::FetchError;
use crate::http::request::strip_hop_by_hop;
use crate::rewrite::ProxiedResponse;

/// Build the browser-facing response.
pub fn into_client_response(proxied: ProxiedResponse) -> Response {
    let ProxiedResponse {
        status,
        reason,
        mut headers,
        body,
        ..
    } = proxied;

    strip_hop_by_hop(&mut headers);
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    if let Some(reason) = reason.filter(|r| Some(r.as_str()) != status.canonical_reason()) {
        match ReasonPhrase::try_from(reason.into_bytes()) {
            Ok(phrase) => {
                response.extensions_mut().insert(phrase);
            }
            Err(_) => tracing::debug!(status = %status, "Dropping invalid upstream reason phrase"),
        }
    }

    response
}

/// Response for a request whose upstream could not be reached.
pub fn fetch_failure(error: &FetchError) -> Response {
    match error {
        FetchError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response(),
        _ => (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response(),
    }
}

/// Response for an upstream response that could not be rewritten.
pub fn dispatch_failure(_error: &DispatchError) -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream response could not be processed").into_response()
}

/// Response for a request that names no valid target.
pub fn bad_target() -> Response {
    (StatusCode::BAD_REQUEST, "Request path must be an absolute http(s) URL").into_response()
}

/// Response for an inbound body over the configured limit.
pub fn body_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::ContentKind;
    use axum::body::Body;
    use axum::http::HeaderMap;

    fn proxied(headers: HeaderMap) -> ProxiedResponse {
        ProxiedResponse {
            status: StatusCode::OK,
            reason: None,
            headers,
            body: Body::empty(),
            kind: ContentKind::Html,
        }
    }

    #[test]
    fn test_cache_control_defaulted() {
        let response = into_client_response(proxied(HeaderMap::new()));
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }

    #[test]
    fn test_cache_control_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        let response = into_client_response(proxied(headers));
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_custom_reason_phrase_forwarded() {
        let mut p = proxied(HeaderMap::new());
        p.status = StatusCode::IM_A_TEAPOT;
        p.reason = Some("Short and stout".into());
        let response = into_client_response(p);
        let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(phrase.as_bytes(), b"Short and stout");

        let mut p = proxied(HeaderMap::new());
        p.reason = Some("OK".into());
        let response = into_client_response(p);
        assert!(response.extensions().get::<ReasonPhrase>().is_none());
    }
}
