//! Admission key extraction.
//!
//! Turns a captured request into the `(key, weight)` pair the admission
//! limiter buckets on. Pure function of the request; never blocks.

use axum::http::header;
use thiserror::Error;

use crate::config::Variable;
use crate::http::request::MirrorRequest;

/// Weight charged per mirrored request for every supported variable.
pub const UNIT_WEIGHT: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("client address is not available on the request")]
    MissingClientAddr,

    #[error("request carries no host")]
    MissingHost,

    #[error("header '{0}' is not valid UTF-8")]
    InvalidHeaderValue(String),
}

/// Reads the configured variable from a request.
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    variable: Variable,
}

impl KeyExtractor {
    pub fn new(variable: Variable) -> Self {
        Self { variable }
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn extract(&self, request: &MirrorRequest) -> Result<(String, u64), ExtractionError> {
        let key = match &self.variable {
            Variable::ClientIp => request
                .client_addr
                .map(|addr| addr.ip().to_string())
                .ok_or(ExtractionError::MissingClientAddr)?,
            Variable::RequestHost => match request.headers.get(header::HOST) {
                Some(host) => host
                    .to_str()
                    .map_err(|_| ExtractionError::InvalidHeaderValue(header::HOST.to_string()))?
                    .to_string(),
                None => request
                    .uri
                    .authority()
                    .map(|authority| authority.to_string())
                    .ok_or(ExtractionError::MissingHost)?,
            },
            // A missing header is the empty key, same as an empty value.
            Variable::RequestHeader { name, header } => match request.headers.get(header) {
                Some(value) => value
                    .to_str()
                    .map_err(|_| ExtractionError::InvalidHeaderValue(name.clone()))?
                    .to_string(),
                None => String::new(),
            },
        };

        Ok((key, UNIT_WEIGHT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method, Uri};

    fn request(uri: &str, headers: &[(&str, &[u8])], client: Option<&str>) -> MirrorRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_bytes(value).unwrap(),
            );
        }
        MirrorRequest {
            method: Method::GET,
            uri: uri.parse::<Uri>().unwrap(),
            headers: map,
            client_addr: client.map(|c| c.parse().unwrap()),
            body: Bytes::new(),
        }
    }

    fn extractor(variable: &str) -> KeyExtractor {
        KeyExtractor::new(variable.parse().unwrap())
    }

    #[test]
    fn test_client_ip() {
        let req = request("/", &[], Some("192.168.1.20:53211"));
        assert_eq!(extractor("client.ip").extract(&req).unwrap(), ("192.168.1.20".to_string(), 1));

        let v6 = request("/", &[], Some("[::1]:8080"));
        assert_eq!(extractor("client.ip").extract(&v6).unwrap().0, "::1");
    }

    #[test]
    fn test_client_ip_missing() {
        let req = request("/", &[], None);
        assert_eq!(
            extractor("client.ip").extract(&req).unwrap_err(),
            ExtractionError::MissingClientAddr
        );
    }

    #[test]
    fn test_request_host() {
        let req = request("/", &[("host", b"api.example.com")], None);
        assert_eq!(extractor("request.host").extract(&req).unwrap().0, "api.example.com");

        let absolute = request("http://origin.example.com:8080/path", &[], None);
        assert_eq!(extractor("request.host").extract(&absolute).unwrap().0, "origin.example.com:8080");

        let none = request("/", &[], None);
        assert_eq!(extractor("request.host").extract(&none).unwrap_err(), ExtractionError::MissingHost);
    }

    #[test]
    fn test_header_value() {
        let ex = extractor("request.header.X-Tenant");

        let acme = request("/", &[("x-tenant", b"acme")], None);
        assert_eq!(ex.extract(&acme).unwrap(), ("acme".to_string(), 1));

        let empty = request("/", &[("x-tenant", b"")], None);
        assert_eq!(ex.extract(&empty).unwrap().0, "");

        let missing = request("/", &[], None);
        assert_eq!(ex.extract(&missing).unwrap().0, "");

        let binary = request("/", &[("x-tenant", b"\xff\xfe")], None);
        assert_eq!(
            ex.extract(&binary).unwrap_err(),
            ExtractionError::InvalidHeaderValue("X-Tenant".into())
        );
    }

    #[test]
    fn test_extract_does_not_mutate() {
        let req = request("/a?b=c", &[("x-tenant", b"acme")], Some("127.0.0.1:1"));
        let before = req.headers.clone();
        let _ = extractor("request.header.X-Tenant").extract(&req);
        assert_eq!(req.headers, before);
        assert_eq!(req.uri, "/a?b=c");
    }
}
