// src/server/mod.rs

use crate::config::Config;
use crate::core::cluster;
use crate::core::replication;
use crate::core::state::ServerState;
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

pub mod http;
mod metrics_server;
pub mod routing;

/// The main broker startup function: initializes state, binds the public
/// and inter-node listeners, and serves until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let host = config.host.clone();
    let api_port = config.api_port();
    let rpc_port = config.cluster.rpc_port;

    let state = ServerState::initialize(config).await?;
    let http_listener = TcpListener::bind((host.as_str(), api_port)).await?;
    let rpc_listener = TcpListener::bind((host.as_str(), rpc_port)).await?;
    serve(state, http_listener, rpc_listener).await
}

/// Serves on pre-bound listeners. Split from `run` so embedders and tests
/// can pick their own ports.
pub async fn serve(
    state: Arc<ServerState>,
    http_listener: TcpListener,
    rpc_listener: TcpListener,
) -> Result<()> {
    log_startup_info(&state);
    let (shutdown_tx, _) = broadcast::channel(1);

    // Background tasks: the RPC endpoint, the metrics exporter, and the
    // best-effort catalog sync.
    tokio::spawn(replication::server::run(
        state.clone(),
        rpc_listener,
        shutdown_tx.subscribe(),
    ));
    if state.config.metrics.enabled {
        tokio::spawn(metrics_server::run(state.clone(), shutdown_tx.subscribe()));
    }
    tokio::spawn(cluster::sync::run(state.clone()));

    let app = http::router(state.clone());
    info!("CitrineMQ API listening on {}", http_listener.local_addr()?);
    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;
    Ok(())
}

fn log_startup_info(state: &Arc<ServerState>) {
    let cluster = &state.config.cluster;
    if cluster.partitioning_enabled {
        info!(
            "Node {} starting in PARTITIONED mode: {} node(s), replication factor {}.",
            cluster.self_host,
            state.partitions.node_count(),
            cluster.replication_factor,
        );
    } else {
        info!(
            "Node {} starting in BROADCAST mode: every mutation replicates to all {} peer(s).",
            cluster.self_host,
            cluster.nodes.len(),
        );
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received.");
    let _ = shutdown_tx.send(());
}
