//! Forwarding of captured requests to the mirror target.
//!
//! # Responsibilities
//! - Own the HTTP client (and its connection pool) shared by all mirror tasks
//! - Derive a per-request target from scheme, host, path and query
//! - Send the request and drain the response
//!
//! # Design Decisions
//! - The target is an immutable value passed into `forward`; the shared
//!   client carries no per-request state
//! - Redirects are never followed and environment proxies are ignored
//! - The response is read to completion and dropped, never inspected

use axum::http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::MirrorConfig;
use crate::http::request::MirrorRequest;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid mirror target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("mirror transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Where a single mirrored request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    url: Url,
}

impl ForwardTarget {
    /// Combine the configured scheme and host with the request's path and
    /// raw query string.
    pub fn for_request(config: &MirrorConfig, request: &MirrorRequest) -> Result<Self, ForwardError> {
        let path_and_query = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{}://{}{}", config.scheme(), config.host(), path_and_query);

        let url = Url::parse(&target).map_err(|source| ForwardError::InvalidTarget { target, source })?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Result of a completed mirror round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOutcome {
    pub status: StatusCode,
    pub drained_bytes: usize,
}

/// Shared forwarding capability. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// Build the client from the configured transport timeouts.
    pub fn new(config: &MirrorConfig) -> Result<Self, reqwest::Error> {
        let keepalive = Some(config.keepalive()).filter(|d| !d.is_zero());

        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .tcp_keepalive(keepalive);
        if let Some(deadline) = config.connect_deadline() {
            builder = builder.connect_timeout(deadline);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Replay `request` against `target`.
    ///
    /// The response body is always consumed, on success and on a mid-body
    /// failure alike, so the pooled connection is released.
    pub async fn forward(&self, target: &ForwardTarget, request: MirrorRequest) -> Result<ForwardOutcome, ForwardError> {
        let headers = request.forward_headers();

        let mut response = self
            .client
            .request(request.method, target.url.clone())
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let mut drained_bytes = 0;
        while let Some(chunk) = response.chunk().await? {
            drained_bytes += chunk.len();
        }

        Ok(ForwardOutcome { status, drained_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};

    fn request(uri: &str) -> MirrorRequest {
        MirrorRequest {
            method: Method::GET,
            uri: uri.parse().unwrap(),
            headers: HeaderMap::new(),
            client_addr: None,
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_target_keeps_path_and_query() {
        let config = MirrorConfig::new("https", "shadow.internal:8443", 0, 0, 0, 0, "client.ip").unwrap();
        let target = ForwardTarget::for_request(&config, &request("/v1/search?q=rust&page=2")).unwrap();
        assert_eq!(target.url().as_str(), "https://shadow.internal:8443/v1/search?q=rust&page=2");
    }

    #[test]
    fn test_target_ignores_inbound_authority() {
        let config = MirrorConfig::new("http", "127.0.0.1:5000", 0, 0, 0, 0, "client.ip").unwrap();
        let target = ForwardTarget::for_request(&config, &request("http://primary.example.com/x")).unwrap();
        assert_eq!(target.url().as_str(), "http://127.0.0.1:5000/x");
    }

    #[test]
    fn test_target_invalid_host() {
        let config = MirrorConfig::new("http", "bad host", 0, 0, 0, 0, "client.ip").unwrap();
        let err = ForwardTarget::for_request(&config, &request("/")).unwrap_err();
        assert!(matches!(err, ForwardError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn test_forward_unreachable() {
        let config = MirrorConfig::new("http", "127.0.0.1:1", 500, 0, 0, 0, "client.ip").unwrap();
        let forwarder = Forwarder::new(&config).unwrap();
        let target = ForwardTarget::for_request(&config, &request("/")).unwrap();

        let err = forwarder.forward(&target, request("/")).await.unwrap_err();
        assert!(matches!(err, ForwardError::Transport(_)));
    }
}
