//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → request.rs (request ID assigned or preserved)
//!     → security::rate_limit (per-client fixed window)
//!     → admin (health snapshot, operator resets)
//! ```

pub mod request;
pub mod server;

pub use request::{request_id_middleware, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
