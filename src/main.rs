//! Discovery gateway.
//!
//! A self-registering customers service built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                  DISCOVERY GATEWAY                   │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌─────────────┐   ┌──────────────┐   │
//!   ──────────────────┼─▶│  http    │──▶│ maintenance │──▶│   handlers   │   │
//!                     │  │  server  │   │    gate     │   │              │   │
//!                     │  └──────────┘   └──────┬──────┘   └──────┬───────┘   │
//!                     │                        │ reads           │ discover  │
//!                     │                        ▼                 ▼           │
//!                     │                 ┌─────────────┐   ┌──────────────┐   │    Collaborator
//!                     │                 │   store     │   │  discovery   │───┼──▶ services
//!                     │                 │ (config)    │   │ + upstream   │   │
//!                     │                 └──────┬──────┘   └──────┬───────┘   │
//!                     │                        │ watch           │ register  │
//!                     │                        ▼                 ▼           │
//!                     │                 Consul KV / file   Consul / memory   │
//!                     │                                                      │
//!                     │  ┌────────────────────────────────────────────────┐  │
//!                     │  │ lifecycle: register → serve → drain → exit     │  │
//!                     │  │ observability · resilience · admin API         │  │
//!                     │  └────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use discovery_gateway::admin::setup_admin_router;
use discovery_gateway::config::load_or_default;
use discovery_gateway::http::HttpServer;
use discovery_gateway::lifecycle::{
    assemble, registry_backend, spawn_signal_listener, Shutdown, TerminationSignals,
};
use discovery_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "discovery-gateway", version, about)]
struct Args {
    /// Bootstrap configuration file; also the local config source.
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, found) = load_or_default(&args.config)?;
    logging::init_logging(&config.observability);
    if !found {
        tracing::warn!(path = ?args.config, "Configuration file not found, using defaults");
    }

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        environment = %config.service.environment,
        "discovery-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

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
    let registry = registry_backend(&config)?;
    let ping_interval = Duration::from_secs(config.registry.ping_interval_secs);

    let components = assemble(config, &args.config, true, registry, shutdown.clone()).await?;
    let state = components.state.clone();
    let lifecycle = state.lifecycle.clone();

    // Signals are observed from before registration so none is lost.
    let signals = TerminationSignals::install()?;

    let listeners = match components.start().await {
        Ok(listeners) => listeners,
        Err(e) => {
            tracing::error!(error = %e, "Startup aborted");
            std::process::exit(1);
        }
    };

    let _heartbeat = lifecycle.spawn_heartbeat(ping_interval);
    let _signal_listener = spawn_signal_listener(signals, lifecycle.clone());

    if let Some(admin_listener) = listeners.admin {
        let admin_router = setup_admin_router(state.clone());
        let admin_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, admin_router)
                .with_graceful_shutdown(async move { admin_shutdown.wait().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let server = HttpServer::new(state.clone(), &state.config.timeouts);
    if let Err(e) = server.run(listeners.http, shutdown.clone()).await {
        tracing::error!(error = %e, "HTTP server failed");
        lifecycle.begin_drain().await;
    }

    lifecycle.drain().await;
    let code = lifecycle.finish();
    drop(components.file_watcher);
    tracing::info!(exit_code = code, "Shutdown complete");
    std::process::exit(code);
}
