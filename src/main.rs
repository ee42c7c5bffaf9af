//! resilience-guard service.
//!
//! ```text
//!   config.toml ──▶ GuardConfig ──▶ ResilienceRegistry ──┬──▶ HttpServer
//!                                    (breakers, limiters)  │     /health
//!                                                          │     /admin/*
//!                                                          └──▶ limiter sweepers
//!   SIGINT/SIGTERM ──▶ Shutdown broadcast ──▶ server drain + sweepers exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use resilience_guard::config::loader::load_config;
use resilience_guard::lifecycle::signals::wait_for_signal;
use resilience_guard::observability::{logging, metrics};
use resilience_guard::{GuardConfig, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "resilience-guard", version, about = "Circuit breakers and rate limiters with an operator API")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_tracing(&config.observability);
    tracing::info!("resilience-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        config_path = ?args.config,
        bind_address = %config.server.bind_address,
        breakers = config.breakers.len(),
        limiters = config.limiters.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
