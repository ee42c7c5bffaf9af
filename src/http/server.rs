//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with health and admin handlers
//! - Wire up middleware (tracing, timeout, request ID, rate limiting)
//! - Start limiter sweepers alongside the listener
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, setup_health_router};
use crate::config::GuardConfig;
use crate::http::request::request_id_middleware;
use crate::registry::ResilienceRegistry;
use crate::security::rate_limit::{rate_limit_middleware, ClientRateLimit};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ResilienceRegistry>,
    pub admin_key: Arc<str>,
}

/// HTTP front for the registry.
pub struct HttpServer {
    router: Router,
    registry: Arc<ResilienceRegistry>,
}

impl HttpServer {
    /// Build the registry described by `config` and the router over it.
    pub fn new(config: GuardConfig) -> Self {
        let registry = Arc::new(ResilienceRegistry::from_config(&config));
        let state = AppState {
            registry: registry.clone(),
            admin_key: Arc::from(config.admin.api_key.as_str()),
        };
        let router = Self::build_router(&config, state);
        Self { router, registry }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The inbound limiter covers the public routes only. `/admin/*` is
    /// authenticated and stays reachable while clients are being throttled.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let mut public = setup_health_router(state.clone());

        if config.http_rate_limit.enabled {
            match state.registry.limiter(&config.http_rate_limit.limiter) {
                Some(limiter) => {
                    let guard =
                        ClientRateLimit::new(limiter, config.http_rate_limit.trust_forwarded_for);
                    public = public.layer(middleware::from_fn_with_state(
                        guard,
                        rate_limit_middleware,
                    ));
                }
                None => tracing::warn!(
                    limiter = %config.http_rate_limit.limiter,
                    "HTTP rate limiter not found, inbound traffic is unlimited"
                ),
            }
        }

        public
            .merge(setup_admin_router(state))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    /// A clone of the router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweepers = self.registry.spawn_sweepers(&shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        // A sweeper subscribed after the signal was sent never sees it.
        for sweeper in sweepers {
            sweeper.abort();
            let _ = sweeper.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
