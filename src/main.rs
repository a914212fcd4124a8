//! Resilient cache service.
//!
//! Runs the cache client's health endpoint and Prometheus exporter.
//!
//! ```text
//!     caller ──▶ ResilientClient ──▶ CircuitBreaker ──▶ ConnectionPool ──▶ Redis
//!                      │                   │
//!                      │              (deny / failure)
//!                      ▼                   ▼
//!                 ClientMetrics      MemoryFallback
//!
//!     ops ──▶ GET /health ──▶ HealthReporter ──▶ probe through ResilientClient
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use resilient_cache::config::{load_config, load_from_env};
use resilient_cache::health::HealthReporter;
use resilient_cache::http::HealthServer;
use resilient_cache::lifecycle::{build_client, wait_for_signal, Shutdown};
use resilient_cache::observability::{init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "resilient-cache")]
#[command(about = "Circuit-breaker-guarded cache client with health endpoint", long_about = None)]
struct Cli {
    /// TOML configuration file. Without it, defaults plus environment overrides apply.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-cache starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = build_client(&config)?;
    let shutdown = Arc::new(Shutdown::new());

    let server_task = if config.health.enabled {
        let listener = TcpListener::bind(&config.health.bind_address).await?;
        let reporter = Arc::new(HealthReporter::new(client.clone(), config.health.probe_key_prefix.clone()));
        let server = HealthServer::new(reporter, &config.health);
        let rx = shutdown.subscribe();
        Some(tokio::spawn(server.run(listener, rx)))
    } else {
        tracing::info!("Health endpoint disabled");
        None
    };

    wait_for_signal().await;
    shutdown.trigger();

    if let Some(task) = server_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Health server exited with error"),
            Err(e) => tracing::error!(error = %e, "Health server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    client.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
