//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use resilience_guard::{GuardConfig, HttpServer, ResilienceRegistry, Shutdown};

pub const ADMIN_KEY: &str = "integration-key";

/// Start the server on `addr` and return its registry and shutdown handle.
pub async fn start_server(
    addr: SocketAddr,
    mut config: GuardConfig,
) -> (Arc<ResilienceRegistry>, Shutdown) {
    config.server.bind_address = addr.to_string();
    config.admin.api_key = ADMIN_KEY.to_string();
    config.observability.metrics_enabled = false;

    let server = HttpServer::new(config);
    let registry = server.registry().clone();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (registry, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
