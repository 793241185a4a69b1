//! Upstream fetching.
//!
//! # Responsibilities
//! - Send the forwarded request to the origin
//! - Return every response as-is (redirects are not followed, error
//!   statuses are not raised, a non-canonical reason phrase is kept)
//! - Expose the body as a stream so pass-through content is never buffered
//!
//! # Design Decisions
//! - [`Upstream`] is a trait so the request handler can run against a stub
//! - Timeouts are the client's concern, not the rewriter's

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;
use hyper::ext::ReasonPhrase;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// Request forwarded to the origin.
#[derive(Debug)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response received from the origin.
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Reason phrase, when the origin sent a non-canonical one.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Errors that prevent any upstream response from being obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("upstream timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e)
        } else {
            FetchError::Request(e)
        }
    }
}

/// Fetches resources from origin servers.
pub trait Upstream: Send + Sync {
    fn fetch(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, FetchError>>;
}

/// [`Upstream`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_secs))
            .timeout(Duration::from_secs(config.request_secs));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    fn fetch(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, FetchError>> {
        Box::pin(async move {
            tracing::debug!(method = %request.method, url = %request.url, "Fetching upstream");

            let response = self
                .client
                .request(request.method, request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;

            let status = response.status();
            let reason = response
                .extensions()
                .get::<ReasonPhrase>()
                .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
                .map(str::to_string);
            let headers = response.headers().clone();
            let body = Body::from_stream(response.bytes_stream());

            Ok(UpstreamResponse {
                status,
                reason,
                headers,
                body,
            })
        })
    }
}
