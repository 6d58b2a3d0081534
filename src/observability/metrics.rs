//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_requests_total` (counter): mirror decisions and task results,
//!   labelled by `outcome`
//! - `primary_request_duration_seconds` (histogram): primary path latency,
//!   labelled by `status`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// What happened to one request on the mirror path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Task spawned.
    Dispatched,
    /// Refused by the admission limiter.
    Limited,
    /// Admission key could not be read.
    ExtractionFailed,
    /// Body could not be buffered for replay.
    BodySkipped,
    /// Mirror target answered and the response was drained.
    Completed,
    /// Target, transport or drain failure.
    Failed,
}

impl MirrorOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorOutcome::Dispatched => "dispatched",
            MirrorOutcome::Limited => "limited",
            MirrorOutcome::ExtractionFailed => "extraction_failed",
            MirrorOutcome::BodySkipped => "body_skipped",
            MirrorOutcome::Completed => "completed",
            MirrorOutcome::Failed => "failed",
        }
    }
}

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_mirror(outcome: MirrorOutcome) {
    metrics::counter!("mirror_requests_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_primary(status: u16, start: Instant) {
    metrics::histogram!("primary_request_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
