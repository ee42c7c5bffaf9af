//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external dependency:
//!     → circuit_breaker.rs (admit? lazily recompute Open → HalfOpen)
//!     → wrapped operation (single attempt, caller owns timeouts/retries)
//!     → circuit_breaker.rs (record outcome, transition, telemetry)
//!     → error.rs (Open rejection or upstream error, or fallback value)
//! ```
//!
//! # Design Decisions
//! - One breaker per logical dependency, owned by the registry
//! - No background timers; cooldown expiry is checked on each call
//! - The breaker never retries and never cancels the wrapped operation

pub mod circuit_breaker;
pub mod error;

pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitState};
pub use error::BreakerError;
