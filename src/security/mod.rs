//! Mirror admission control.
//!
//! # Data Flow
//! ```text
//! Captured request:
//!     → extract.rs (derive key + weight from the configured variable)
//!     → admission.rs (admit or refuse against the per-key quota)
//!     → dispatch mirror, or skip it
//! ```
//!
//! # Design Decisions
//! - Fail open for the caller: a refused or unreadable request is simply
//!   not mirrored, the primary response is never touched
//! - One limiter per handler, never global

pub mod admission;
pub mod extract;

pub use admission::{AdmissionLimiter, LimitExceeded};
pub use extract::{ExtractionError, KeyExtractor};
