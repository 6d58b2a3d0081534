//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Mirror handler / primary proxy produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Each mirror task runs in its own span carrying a `mirror_id`
//! - Metrics are cheap and no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
