// src/core/cluster/partition.rs

//! Deterministic partitioning of topic and queue names onto the node ring.
//!
//! The mapping is a pure function of the name, the sorted node set, and the
//! replication factor, so every node computes the same assignment without
//! coordination.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The two kinds of named resources the broker partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Topic,
    Queue,
}

/// The partition assignment for a single name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub primary: String,
    pub secondaries: Vec<String>,
    pub is_primary: bool,
    pub is_secondary: bool,
}

impl Assignment {
    /// Whether the local node holds this name at all.
    pub fn is_responsible(&self) -> bool {
        self.is_primary || self.is_secondary
    }

    /// The primary followed by the secondaries, in ring order.
    pub fn all_responsible(&self) -> Vec<String> {
        let mut nodes = Vec::with_capacity(1 + self.secondaries.len());
        nodes.push(self.primary.clone());
        nodes.extend(self.secondaries.iter().cloned());
        nodes
    }
}

/// The static view of the ring: the full node set (self included) sorted
/// lexicographically, the replication factor, and this node's address.
#[derive(Debug, Clone)]
pub struct PartitionMap {
    nodes: Vec<String>,
    replication_factor: usize,
    self_addr: String,
}

impl PartitionMap {
    pub fn new(self_addr: &str, peers: &[String], replication_factor: usize) -> Self {
        let mut nodes: Vec<String> = peers.to_vec();
        nodes.push(self_addr.to_string());
        nodes.sort();
        nodes.dedup();
        Self {
            nodes,
            replication_factor: replication_factor.max(1),
            self_addr: self_addr.to_string(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Computes the assignment for a name. The primary is the ring position
    /// of the name's digest; the secondaries are the next `R-1` nodes.
    pub fn assignment(&self, kind: ResourceKind, name: &str) -> Assignment {
        let node_count = self.nodes.len();
        let hash = ring_position(kind, name);
        let primary_index = (hash % node_count as u128) as usize;

        // R is clamped to the ring size so wrap-around never revisits a node.
        let replicas = self.replication_factor.min(node_count);
        let secondaries: Vec<String> = (1..replicas)
            .map(|i| self.nodes[(primary_index + i) % node_count].clone())
            .collect();

        let primary = self.nodes[primary_index].clone();
        let is_primary = primary == self.self_addr;
        let is_secondary = secondaries.iter().any(|n| *n == self.self_addr);
        Assignment {
            primary,
            secondaries,
            is_primary,
            is_secondary,
        }
    }
}

/// The name's position on the ring: the first 128 bits of SHA-256, big-endian.
/// Queues are offset by one so a topic and a queue of the same name land on
/// different positions.
fn ring_position(kind: ResourceKind, name: &str) -> u128 {
    let digest = Sha256::digest(name.as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    let hash = u128::from_be_bytes(prefix);
    match kind {
        ResourceKind::Topic => hash,
        ResourceKind::Queue => hash.wrapping_add(1),
    }
}
