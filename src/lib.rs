//! Resilience primitives for services that front third-party APIs.
//!
//! - [`resilience::CircuitBreaker`] guards one external dependency
//! - [`security::rate_limit::RateLimiter`] caps requests per identifier in
//!   fixed windows
//! - [`registry::ResilienceRegistry`] owns the named instances
//! - [`http::HttpServer`] exposes health snapshots and operator resets

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod security;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::ResilienceRegistry;
