//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check mirror target, timeouts and limiter parameters
//! - Check listener and upstream addresses
//!
//! # Design Decisions
//! - `validate_config` returns all validation errors, not just first
//! - `MirrorConfig::new` stops at the first problem, one distinct reason each
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::mirror::MirrorConfig;
use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("mirror scheme can't be empty")]
    EmptyScheme,

    #[error("mirror host can't be empty")]
    EmptyHost,

    #[error("invalid mirror scheme '{0}', only http[s] allowed")]
    UnsupportedScheme(String),

    #[error("timeout can't be less than zero (got {0}ms)")]
    NegativeTimeout(i64),

    #[error("keepalive can't be less than zero (got {0}ms)")]
    NegativeKeepAlive(i64),

    #[error("TLS handshake timeout can't be less than zero (got {0}ms)")]
    NegativeTlsHandshakeTimeout(i64),

    #[error("connections limit can't be less than zero (got {0})")]
    NegativeConnections(i64),

    #[error("unsupported limiting variable: '{0}'")]
    UnsupportedVariable(String),

    #[error("header variable needs a header name, e.g. request.header.X-Header")]
    EmptyHeaderName,

    #[error("invalid header name in limiting variable: '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid listener bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("upstream address can't be empty")]
    EmptyUpstream,
}

/// Validate the whole application config and produce the mirror config.
pub fn validate_config(config: &AppConfig) -> Result<MirrorConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    if config.upstream.address.trim().is_empty() {
        errors.push(ValidationError::EmptyUpstream);
    }

    match config.mirror.validate() {
        Ok(mirror) if errors.is_empty() => Ok(mirror),
        Ok(_) => Err(errors),
        Err(e) => {
            errors.push(e);
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.mirror.scheme = "http".into();
        config.mirror.host = "127.0.0.1:5000".into();
        config
    }

    #[test]
    fn test_valid_config() {
        let mirror = validate_config(&app_config()).unwrap();
        assert_eq!(mirror.host(), "127.0.0.1:5000");
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = app_config();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.address = "".into();
        config.mirror.connections = -5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-address".into()),
                ValidationError::EmptyUpstream,
                ValidationError::NegativeConnections(-5),
            ]
        );
    }
}
