//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client fixed window, 429 on exhaustion)
//!     → admin::auth (bearer key for operator routes)
//!     → handlers
//! ```
//!
//! # Design Decisions
//! - Rate-limit exhaustion is a decision, not an error; the middleware maps
//!   it to 429 with `Retry-After`
//! - Limiter state is in-process only and is lost on restart

pub mod rate_limit;
