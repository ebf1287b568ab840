// src/core/state.rs

//! Defines the central `ServerState` struct, holding all shared node-wide state.

use crate::config::Config;
use crate::core::CitrineError;
use crate::core::auth::TokenIssuer;
use crate::core::cluster::{Assignment, PartitionMap, ResourceKind};
use crate::core::metrics;
use crate::core::replication::ReplayGuard;
use crate::core::storage::Store;
use std::sync::Arc;

/// The central struct holding all shared, node-wide state. It is wrapped in
/// an `Arc` and passed to every HTTP handler and RPC server task, providing a
/// single source of truth for the node's configuration and dynamic state.
#[derive(Debug)]
pub struct ServerState {
    /// The node configuration, static for the run.
    pub config: Config,
    /// The durable local store shared by the HTTP handlers and the RPC server.
    pub store: Store,
    /// The static partition view of the cluster.
    pub partitions: PartitionMap,
    /// The memo of recently applied replicated operations.
    pub replay_guard: ReplayGuard,
    /// Issues and verifies access tokens.
    pub tokens: TokenIssuer,
    /// Shared HTTP client for request forwarding and list aggregation.
    pub http_client: reqwest::Client,
}

impl ServerState {
    /// Initializes the node state from the given configuration: opens the
    /// store, builds the partition map, and prepares the outbound clients.
    pub async fn initialize(config: Config) -> Result<Arc<Self>, CitrineError> {
        let store = Store::open(&config.database_path).await?;
        let partitions = PartitionMap::new(
            &config.cluster.self_host,
            &config.cluster.nodes,
            config.cluster.replication_factor,
        );
        metrics::CLUSTER_PEERS.set(config.cluster.nodes.len() as f64);
        let tokens = TokenIssuer::new(
            config.auth.secret_key.clone(),
            config.auth.token_expire_minutes,
        );
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| CitrineError::Internal(format!("http client: {e}")))?;
        Ok(Arc::new(Self {
            config,
            store,
            partitions,
            replay_guard: ReplayGuard::new(),
            tokens,
            http_client,
        }))
    }

    pub fn assignment(&self, kind: ResourceKind, name: &str) -> Assignment {
        self.partitions.assignment(kind, name)
    }

    /// The peers a successful local mutation fans out to: the rest of the
    /// responsible set under partitioning, every peer in broadcast mode.
    pub fn replication_targets(&self, assignment: &Assignment) -> Vec<String> {
        if self.config.cluster.partitioning_enabled {
            assignment
                .all_responsible()
                .into_iter()
                .filter(|node| node != self.partitions.self_addr())
                .collect()
        } else {
            self.config.cluster.nodes.clone()
        }
    }
}
