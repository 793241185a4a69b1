//! Content-type dispatch.
//!
//! # Responsibilities
//! - Rewrite response headers for every response
//! - Route `text/html` and `text/css` bodies to their rewriters
//! - Stream every other body through untouched
//!
//! # Design Decisions
//! - The content kind is decided once, from the primary `Content-Type`
//!   token, matched case-sensitively
//! - Only rewritten bodies are buffered, and only up to a configured cap
//! - Compressed bodies are never rewritten

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use futures_util::StreamExt;

use crate::error::DispatchError;
use crate::http::client::UpstreamResponse;
use crate::rewrite::css::rewrite_stylesheet;
use crate::rewrite::headers::rewrite_headers;
use crate::rewrite::html::rewrite_html;
use crate::rewrite::url::CurrentContext;

/// How a response body is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Passthrough,
}

impl ContentKind {
    /// Classify a `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let primary = content_type.map(|ct| ct.split_once(';').map_or(ct, |(t, _)| t).trim());
        match primary {
            Some("text/html") => ContentKind::Html,
            Some("text/css") => ContentKind::Css,
            _ => ContentKind::Passthrough,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Css => "css",
            ContentKind::Passthrough => "passthrough",
        }
    }
}

/// Response ready to be sent to the browser.
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub kind: ContentKind,
}

/// Rewrite an upstream response for delivery through the proxy.
pub async fn dispatch(
    response: UpstreamResponse,
    ctx: &CurrentContext<'_>,
    max_body_bytes: usize,
) -> Result<ProxiedResponse, DispatchError> {
    let UpstreamResponse {
        status,
        reason,
        headers: upstream_headers,
        body,
    } = response;

    let mut headers = rewrite_headers(&upstream_headers, ctx);
    let content_type = upstream_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let mut kind = ContentKind::from_content_type(content_type);
    if kind != ContentKind::Passthrough && is_compressed(&upstream_headers) {
        tracing::debug!(kind = kind.as_str(), "Compressed body, skipping rewrite");
        kind = ContentKind::Passthrough;
    }

    let body = match kind {
        ContentKind::Html => {
            let raw = buffer(body, max_body_bytes).await?;
            Body::from(rewrite_html(&raw, content_type, ctx)?)
        }
        ContentKind::Css => {
            let raw = buffer(body, max_body_bytes).await?;
            Body::from(rewrite_stylesheet(&raw, content_type, ctx)?)
        }
        ContentKind::Passthrough => body,
    };

    if kind != ContentKind::Passthrough {
        headers.remove(header::CONTENT_LENGTH);
    }

    Ok(ProxiedResponse {
        status,
        reason,
        headers,
        body,
        kind,
    })
}

fn is_compressed(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .any(|v| !v.as_bytes().eq_ignore_ascii_case(b"identity"))
}

/// Collect a body, refusing to hold more than `limit` bytes.
async fn buffer(body: Body, limit: usize) -> Result<Vec<u8>, DispatchError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Err(DispatchError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::url::tests::SlashGenerator;
    use axum::http::HeaderValue;

    fn upstream(content_type: &'static str, body: &'static [u8]) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        UpstreamResponse {
            status: StatusCode::OK,
            reason: None,
            headers,
            body: Body::from(body),
        }
    }

    async fn body_bytes(body: Body) -> Vec<u8> {
        axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::from_content_type(Some("text/html; charset=UTF-8")), ContentKind::Html);
        assert_eq!(ContentKind::from_content_type(Some("text/html")), ContentKind::Html);
        assert_eq!(ContentKind::from_content_type(Some("text/css;charset=utf-8")), ContentKind::Css);
        assert_eq!(ContentKind::from_content_type(Some("TEXT/HTML")), ContentKind::Passthrough);
        assert_eq!(ContentKind::from_content_type(Some("image/png")), ContentKind::Passthrough);
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Passthrough);
    }

    #[tokio::test]
    async fn test_css_dispatch() {
        let ctx = CurrentContext::new("https://google.com/css/style.css", &SlashGenerator);
        let response = upstream(
            "text/css; charset=UTF-8",
            b"a:hover { background-image: url(../image/link.png); }",
        );

        let out = dispatch(response, &ctx, 1024).await.unwrap();
        assert_eq!(out.kind, ContentKind::Css);
        assert_eq!(out.headers[header::CONTENT_TYPE], "text/css; charset=UTF-8");
        assert!(out.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            body_bytes(out.body).await,
            b"a:hover { background-image: url(\"/https://google.com/image/link.png\"); }"
        );
    }

    #[tokio::test]
    async fn test_binary_passes_through() {
        let ctx = CurrentContext::new("https://google.com/", &SlashGenerator);
        let png: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00url(x)";
        let mut response = upstream("image/png", png);
        response.status = StatusCode::NOT_FOUND;
        response
            .headers
            .insert(header::LOCATION, HeaderValue::from_static("/missing"));

        let out = dispatch(response, &ctx, 4).await.unwrap();
        assert_eq!(out.kind, ContentKind::Passthrough);
        assert_eq!(out.status, StatusCode::NOT_FOUND);
        assert_eq!(out.headers[header::LOCATION], "/https://google.com/missing");
        assert_eq!(out.headers[header::CONTENT_LENGTH], png.len().to_string().as_str());
        assert_eq!(body_bytes(out.body).await, png);
    }

    #[tokio::test]
    async fn test_compressed_html_not_rewritten() {
        let ctx = CurrentContext::new("https://google.com/", &SlashGenerator);
        let mut response = upstream("text/html", b"\x1f\x8b\x08\x00");
        response
            .headers
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let out = dispatch(response, &ctx, 1024).await.unwrap();
        assert_eq!(out.kind, ContentKind::Passthrough);
        assert_eq!(body_bytes(out.body).await, b"\x1f\x8b\x08\x00");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let ctx = CurrentContext::new("https://google.com/", &SlashGenerator);
        let response = upstream("text/html", b"<html><p>too long</p></html>");

        let err = dispatch(response, &ctx, 8).await.err().unwrap();
        assert!(matches!(err, DispatchError::TooLarge { limit: 8 }));
    }
}
