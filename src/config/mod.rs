//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)          CLI flags
//!     → loader.rs                 → cli.rs
//!             ↘                 ↙
//!               schema.rs (AppConfig / MirrorSettings, raw)
//!     → validation.rs (semantic checks)
//!     → mirror.rs MirrorConfig (validated, immutable)
//!     → one MirrorHandler per config consumer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod mirror;
pub mod schema;
pub mod validation;

pub use mirror::{MirrorConfig, Scheme, Variable};
pub use schema::{AppConfig, ListenerConfig, MirrorSettings, ObservabilityConfig, UpstreamConfig};
pub use validation::ValidationError;
