// src/core/cluster/sync.rs

//! Startup catalog reconciliation: adopt topic and queue names that peers
//! hold and this node does not.
//!
//! Only the catalogs converge here; message convergence relies on the
//! replication fan-out that follows every publish. Adopted names belong to
//! the `system` principal until their real owner is learned through a
//! replicated create.

use crate::core::CitrineError;
use crate::core::auth::SYSTEM_PRINCIPAL;
use crate::core::replication::client::fetch_names;
use crate::core::replication::protocol::RpcRequest;
use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Caps the whole exchange with one peer, both list calls included, so a
/// slow peer cannot stall the loop for the other peers.
const PEER_SYNC_BUDGET: Duration = Duration::from_secs(5);

/// Runs the sync against every configured peer, best-effort. Unreachable
/// peers are skipped; the node serves regardless of the outcome.
pub async fn run(state: Arc<ServerState>) {
    if state.config.cluster.nodes.is_empty() {
        return;
    }
    info!(
        "Starting catalog sync against {} peer(s).",
        state.config.cluster.nodes.len()
    );
    for peer in &state.config.cluster.nodes {
        let Some(rpc_addr) = state.config.rpc_addr_for(peer) else {
            warn!("no RPC address derivable for peer '{peer}', skipping sync");
            continue;
        };
        match timeout(PEER_SYNC_BUDGET, sync_peer(&state, &rpc_addr)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("catalog sync with {peer} ({rpc_addr}) failed: {e}"),
            Err(_) => warn!(
                "catalog sync with {peer} ({rpc_addr}) exceeded the {}s budget",
                PEER_SYNC_BUDGET.as_secs()
            ),
        }
    }
    info!("Catalog sync finished.");
}

async fn sync_peer(state: &ServerState, rpc_addr: &str) -> Result<(), CitrineError> {
    let remote_topics = fetch_names(rpc_addr, RpcRequest::ListTopics).await?;
    let local_topics = state.store.list_topics().await?;
    for name in remote_topics {
        if local_topics.contains(&name) {
            continue;
        }
        match state.store.create_topic(&name, SYSTEM_PRINCIPAL).await {
            Ok(()) => info!("adopted topic '{name}' from {rpc_addr}"),
            Err(CitrineError::AlreadyExists(..)) => {}
            Err(e) => warn!("failed to adopt topic '{name}': {e}"),
        }
    }

    let remote_queues = fetch_names(rpc_addr, RpcRequest::ListQueues).await?;
    let local_queues = state.store.list_queues().await?;
    for name in remote_queues {
        if local_queues.contains(&name) {
            continue;
        }
        match state.store.create_queue(&name, SYSTEM_PRINCIPAL).await {
            Ok(()) => info!("adopted queue '{name}' from {rpc_addr}"),
            Err(CitrineError::AlreadyExists(..)) => {}
            Err(e) => warn!("failed to adopt queue '{name}': {e}"),
        }
    }
    Ok(())
}
