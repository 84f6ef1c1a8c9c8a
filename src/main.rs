//! Cross-service exchange hub.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  EXCHANGE HUB                     │
//!   Peer request         │  ┌──────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ─────────────────────┼─▶│   rate   │──▶│ exchange │──▶│  local data  │  │
//!   POST /exchange       │  │  limit   │   │ handler  │   └──────────────┘  │
//!                        │  └──────────┘   └────┬─────┘                      │
//!                        │                      │ targetService             │
//!                        │                      ▼                           │
//!                        │               ┌──────────────┐   ┌───────────┐  │
//!                        │               │ integration  │──▶│  breaker  │  │
//!                        │               │    client    │   │ registry  │  │
//!                        │               └──────┬───────┘   └───────────┘  │
//!                        │                      │ fails / open / no URL    │
//!                        │                      ▼                           │
//!   Peer service  ◀──────┼── transport    ┌──────────────┐                 │
//!                        │                │   fallback   │                 │
//!                        │                │   snapshot   │                 │
//!                        │                └──────────────┘                 │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use exchange_hub::config::ConfigLoader;
use exchange_hub::observability::{logging, metrics};
use exchange_hub::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "exchange-hub")]
#[command(about = "Cross-service exchange hub", long_about = None)]
struct Args {
    /// TOML configuration file; defaults and EXCHANGE_HUB_* variables apply without one.
    #[arg(short, long, env = "EXCHANGE_HUB_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let config = loader.with_process_env().load()?;

    logging::init_logging(&config.observability)?;
    tracing::info!("exchange-hub v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        service = %config.service.name,
        bind_address = %config.listener.bind_address,
        peers = config.peers.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
