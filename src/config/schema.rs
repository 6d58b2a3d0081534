//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::mirror::{MirrorConfig, DEFAULT_MAX_BODY_BYTES};
use crate::config::validation::ValidationError;

/// Root configuration for the mirroring proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Primary backend every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Mirror target and admission limits.
    pub mirror: MirrorSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Primary upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            request_secs: 30,
        }
    }
}

/// Raw, unvalidated mirror settings.
///
/// Durations are signed milliseconds; see [`MirrorConfig::new`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Scheme of the mirror endpoint, `http` or `https`.
    pub scheme: String,

    /// Host or host:port of the mirror endpoint.
    pub host: String,

    /// Dial timeout in milliseconds.
    pub timeout_ms: i64,

    /// TCP keep-alive interval in milliseconds.
    pub keepalive_ms: i64,

    /// TLS handshake timeout in milliseconds.
    pub tls_handshake_timeout_ms: i64,

    /// Cumulative mirrored requests allowed per variable value (0 = unlimited).
    pub connections: i64,

    /// Limiting variable: client.ip, request.host or request.header.<Name>.
    pub variable: String,

    /// Largest request body buffered for mirroring.
    pub max_body_bytes: usize,
}

pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_KEEPALIVE_MS: i64 = 30_000;
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS: i64 = 10_000;
pub const DEFAULT_VARIABLE: &str = "client.ip";

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            scheme: String::new(),
            host: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
            tls_handshake_timeout_ms: DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS,
            connections: 0,
            variable: DEFAULT_VARIABLE.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl MirrorSettings {
    /// Check the settings and freeze them into a [`MirrorConfig`].
    pub fn validate(&self) -> Result<MirrorConfig, ValidationError> {
        MirrorConfig::new(
            &self.scheme,
            &self.host,
            self.timeout_ms,
            self.keepalive_ms,
            self.tls_handshake_timeout_ms,
            self.connections,
            &self.variable,
        )
        .map(|config| config.with_max_body_bytes(self.max_body_bytes))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
