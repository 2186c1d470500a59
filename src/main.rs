//! Supplier relay
//!
//! Keeps a supplier's local transaction software connected to the central
//! server.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                   SUPPLIER RELAY                      │
//!                    │                                                       │
//!  Central server    │  ┌──────────┐   ┌────────────┐   ┌──────────────┐    │
//!  ◀═══ Socket.IO ═══┼═▶│ channel  │──▶│ correlator │──▶│  dispatch    │────┼──▶ Local API
//!                    │  │(per id)  │◀──│  (ref)     │◀──│ structured / │◀───┼─── (HTTP)
//!                    │  └──────────┘   └─────┬──────┘   │ legacy path  │    │
//!                    │                       │          └──────────────┘    │
//!                    │                       ▼                               │
//!  ◀── HTTP POST ────┼──────────────── ┌──────────┐   ┌──────────┐          │
//!      callbacks     │                 │ callback │◀──│ receiver │◀─────────┼─── Legacy software
//!                    │                 │ emitter  │   │ (HTTP)   │          │    callbacks
//!                    │                 └──────────┘   └──────────┘          │
//!                    │                                                       │
//!                    │   config · lifecycle · observability (cross-cutting)  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use supplier_relay::config::{load_config, schema::ObservabilityConfig};
use supplier_relay::lifecycle::{spawn_signal_handler, Relay, Shutdown};
use supplier_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "supplier-relay")]
#[command(about = "Relay between the central server and a supplier's local software", long_about = None)]
struct Cli {
    /// Optional TOML file; environment variables override its values.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "supplier-relay starting");

    if cli.check {
        tracing::info!(suppliers = config.suppliers.len(), "Configuration is valid");
        return ExitCode::SUCCESS;
    }

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Invalid metrics address"),
        }
    }

    let relay = match Relay::new(&config) {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    match relay.run(&shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Relay failed");
            ExitCode::FAILURE
        }
    }
}
