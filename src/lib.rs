//! Request mirroring middleware.
//!
//! Every request goes to the next handler as usual; admitted requests are
//! also replayed, fire-and-forget, to a mirror target.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::{MirrorConfig, MirrorSettings};
pub use http::{HttpServer, MirrorHandler};
pub use lifecycle::Shutdown;
