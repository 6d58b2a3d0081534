//! Request capture for mirroring.
//!
//! # Responsibilities
//! - Snapshot an inbound request (method, URI, headers, peer, body)
//! - Prepare the header set sent to the mirror target
//!
//! # Design Decisions
//! - The snapshot is owned and immutable; the original request still goes
//!   to the next handler untouched
//! - Hop-by-hop headers are stripped, X-Forwarded-For is appended

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Uri},
};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: [&str; 9] = [
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

/// Owned copy of an inbound request, replayable against the mirror target.
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Peer address, when the server was started with connect info.
    pub client_addr: Option<SocketAddr>,
    pub body: Bytes,
}

impl MirrorRequest {
    /// Snapshot request parts together with an already-buffered body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            client_addr,
            body,
        }
    }

    /// Headers to send upstream.
    ///
    /// Content-Length is dropped as well; the client recomputes it from the
    /// buffered body.
    pub fn forward_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();

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
            headers.remove(name);
        }
        headers.remove(header::CONTENT_LENGTH);

        if let Some(addr) = self.client_addr {
            let ip = addr.ip().to_string();
            let prior: Vec<&str> = self
                .headers
                .get_all(&X_FORWARDED_FOR)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            let value = if prior.is_empty() {
                ip
            } else {
                format!("{}, {}", prior.join(", "), ip)
            };
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        headers
    }
}
