//! Validated mirror configuration.
//!
//! `MirrorConfig` is the only way to describe a mirror target to the rest of
//! the crate. It can only be obtained through [`MirrorConfig::new`] (or
//! [`MirrorSettings::validate`](crate::config::MirrorSettings::validate)), so
//! every value held by a handler has already passed validation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

use crate::config::validation::ValidationError;

/// Default body buffer ceiling for mirrored requests (2MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const HEADER_VARIABLE_PREFIX: &str = "request.header.";

/// Scheme of the mirror target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl FromStr for Scheme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            "" => Err(ValidationError::EmptyScheme),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request attribute used to bucket admission decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    /// `client.ip`: IP of the connecting peer.
    ClientIp,
    /// `request.host`: the Host the request was addressed to.
    RequestHost,
    /// `request.header.<Name>`: value of a named request header.
    RequestHeader {
        /// Header name exactly as configured.
        name: String,
        header: HeaderName,
    },
}

impl FromStr for Variable {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix(HEADER_VARIABLE_PREFIX) {
            if name.is_empty() {
                return Err(ValidationError::EmptyHeaderName);
            }
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ValidationError::InvalidHeaderName(name.to_string()))?;
            return Ok(Variable::RequestHeader {
                name: name.to_string(),
                header,
            });
        }

        match s {
            "client.ip" => Ok(Variable::ClientIp),
            "request.host" => Ok(Variable::RequestHost),
            other => Err(ValidationError::UnsupportedVariable(other.to_string())),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::ClientIp => f.write_str("client.ip"),
            Variable::RequestHost => f.write_str("request.host"),
            Variable::RequestHeader { name, .. } => write!(f, "{}{}", HEADER_VARIABLE_PREFIX, name),
        }
    }
}

/// Immutable, validated mirror configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    scheme: Scheme,
    host: String,
    timeout: Duration,
    keepalive: Duration,
    tls_handshake_timeout: Duration,
    connections: u64,
    variable: Variable,
    max_body_bytes: usize,
}

impl MirrorConfig {
    /// Validate raw mirror parameters.
    ///
    /// Durations are signed milliseconds so that negative inputs coming from
    /// config files can be reported instead of silently clamped. A zero
    /// duration means "no limit"; `connections == 0` disables admission
    /// limiting entirely.
    pub fn new(
        scheme: &str,
        host: &str,
        timeout_ms: i64,
        keepalive_ms: i64,
        tls_handshake_timeout_ms: i64,
        connections: i64,
        variable: &str,
    ) -> Result<Self, ValidationError> {
        if scheme.is_empty() {
            return Err(ValidationError::EmptyScheme);
        }
        if host.is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        let scheme: Scheme = scheme.parse()?;

        let timeout = non_negative(timeout_ms).ok_or(ValidationError::NegativeTimeout(timeout_ms))?;
        let keepalive = non_negative(keepalive_ms).ok_or(ValidationError::NegativeKeepAlive(keepalive_ms))?;
        let tls_handshake_timeout = non_negative(tls_handshake_timeout_ms)
            .ok_or(ValidationError::NegativeTlsHandshakeTimeout(tls_handshake_timeout_ms))?;

        let connections = u64::try_from(connections)
            .map_err(|_| ValidationError::NegativeConnections(connections))?;

        let variable: Variable = variable.parse()?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            timeout,
            keepalive,
            tls_handshake_timeout,
            connections,
            variable,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Override the largest request body that will be buffered for mirroring.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Dial timeout (zero = unbounded).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// TCP keep-alive interval (zero = disabled).
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    /// TLS handshake timeout (zero = unbounded).
    pub fn tls_handshake_timeout(&self) -> Duration {
        self.tls_handshake_timeout
    }

    /// Maximum cumulative weight admitted per key (zero = unlimited).
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Upper bound on establishing a connection to the mirror target.
    ///
    /// The TLS handshake happens inside the connect phase, so for `https` the
    /// two budgets add up. Any zero budget on the path leaves it unbounded.
    pub fn connect_deadline(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            return None;
        }
        match self.scheme {
            Scheme::Http => Some(self.timeout),
            Scheme::Https if self.tls_handshake_timeout.is_zero() => None,
            Scheme::Https => Some(self.timeout + self.tls_handshake_timeout),
        }
    }
}

impl fmt::Display for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scheme={}, host={}, timeout={:?}, keepalive={:?}, tlshandshaketimeout={:?}, connections={}, variable={}",
            self.scheme,
            self.host,
            self.timeout,
            self.keepalive,
            self.tls_handshake_timeout,
            self.connections,
            self.variable,
        )
    }
}

fn non_negative(ms: i64) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}
