//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info, trace/timeout layers)
//!     → mirror.rs (MirrorHandler)
//!         → capture body, call next (primary proxy in server.rs)
//!         → admission check (security/)
//!         → spawn: request.rs snapshot → forward.rs → mirror target
//!     → next handler's response sent to client
//! ```

pub mod forward;
pub mod mirror;
pub mod request;
pub mod server;

pub use forward::{ForwardError, ForwardOutcome, ForwardTarget, Forwarder};
pub use mirror::{MirrorError, MirrorHandler};
pub use request::MirrorRequest;
pub use server::{HttpServer, ServerError};
