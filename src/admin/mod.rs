//! Operator API.
//!
//! `/health` is public; everything under `/admin` requires the bearer key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/reset/breakers", post(reset_breakers))
        .route("/admin/reset/limiters", post(reset_limiters))
        .route("/admin/reset/all", post(emergency_reset))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

pub fn setup_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .with_state(state)
}
