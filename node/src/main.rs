// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # VELA Escrow Node
//!
//! Entry point for the `vela-node` binary. Parses CLI arguments,
//! initializes logging and metrics, constructs the escrow engine with the
//! configured owner and arbitrator, and serves the HTTP/WS API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the escrow node
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use vela_protocol::escrow::EscrowEngine;
use vela_protocol::runtime::{Address, MemorySettlement, SingleOwner};

use cli::{Commands, VelaNodeCli};
use logging::LogFormat;
use metrics::EscrowMetrics;

/// Broadcast channel capacity for live event streaming. 256 is large
/// enough to absorb short bursts without dropping events for connected
/// WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VelaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the escrow node: engine, API server, and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "vela_node=info,vela_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        network = %args.network,
        fee_rate_bps = args.fee_rate_bps,
        "starting vela-node"
    );

    // --- Escrow engine ---
    let owner = Address::new(args.owner);
    if owner.is_null() {
        anyhow::bail!("--owner must be a non-empty hex public key");
    }
    let engine = EscrowEngine::new(
        Box::new(SingleOwner::new(owner.clone())),
        Address::new(args.arbitrator),
        args.fee_rate_bps,
    )
    .context("invalid escrow configuration")?;
    tracing::info!(owner = %owner, arbitrator = %engine.arbitrator(), "escrow engine ready");

    // --- Settlement backend ---
    let settlement = Arc::new(RwLock::new(MemorySettlement::new()));

    // --- Metrics ---
    let node_metrics = Arc::new(EscrowMetrics::new());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            vela_protocol::config::PROTOCOL_VERSION,
        ),
        network: args.network,
        engine: Arc::new(RwLock::new(engine)),
        settlement,
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("vela-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("vela-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", vela_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
