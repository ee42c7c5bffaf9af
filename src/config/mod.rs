//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → registry / http server built from it at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; thresholds are fixed per instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    AdminConfig, BreakerConfig, GuardConfig, HttpRateLimitConfig, LimiterConfig,
    ObservabilityConfig, ServerConfig,
};
