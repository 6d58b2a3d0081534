//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level when both are present.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when the environment does not provide one.
pub fn default_filter(log_level: &str) -> String {
    format!("request_mirror={},tower_http={}", log_level, log_level)
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("debug"), "request_mirror=debug,tower_http=debug");
    }
}
