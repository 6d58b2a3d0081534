//! Command-line flags for the mirror middleware.

use clap::Args;

use crate::config::schema::{MirrorSettings, DEFAULT_VARIABLE};

/// Mirror flags, mapped one-to-one onto [`MirrorSettings`].
#[derive(Debug, Clone, Args)]
pub struct MirrorArgs {
    /// Scheme of endpoint, http[s]
    #[arg(long, default_value = "")]
    pub scheme: String,

    /// Host or host:port of endpoint
    #[arg(long, default_value = "")]
    pub host: String,

    /// Transport timeout
    #[arg(long, value_parser = parse_millis, default_value = "30s")]
    pub timeout: i64,

    /// Transport KeepAlive
    #[arg(long, value_parser = parse_millis, default_value = "30s")]
    pub keepalive: i64,

    /// Transport TLSHandshakeTimeout
    #[arg(long, value_parser = parse_millis, default_value = "10s")]
    pub tlshandshaketimeout: i64,

    /// Limit amount of connections allowed for mirroring per variable value
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub connections: i64,

    /// Limit variable to rate against, e.g. client.ip, request.host or request.header.X-Header
    #[arg(long, default_value = DEFAULT_VARIABLE)]
    pub variable: String,
}

impl From<MirrorArgs> for MirrorSettings {
    fn from(args: MirrorArgs) -> Self {
        Self {
            scheme: args.scheme,
            host: args.host,
            timeout_ms: args.timeout,
            keepalive_ms: args.keepalive,
            tls_handshake_timeout_ms: args.tlshandshaketimeout,
            connections: args.connections,
            variable: args.variable,
            ..MirrorSettings::default()
        }
    }
}

/// Parse a human-readable duration (`30s`, `500ms`) into milliseconds.
fn parse_millis(value: &str) -> Result<i64, String> {
    let duration = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    i64::try_from(duration.as_millis()).map_err(|_| format!("duration '{value}' is too large"))
}
