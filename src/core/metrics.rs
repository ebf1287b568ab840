// src/core/metrics.rs

//! Defines and registers Prometheus metrics for broker monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Router counters ---
    /// Requests this node forwarded to a partition primary.
    pub static ref FORWARDED_REQUESTS_TOTAL: Counter =
        register_counter!("citrinemq_forwarded_requests_total", "Total requests forwarded to the partition primary.").unwrap();
    /// Forwards that failed and fell back to local handling.
    pub static ref FORWARD_FALLBACKS_TOTAL: Counter =
        register_counter!("citrinemq_forward_fallbacks_total", "Total forward failures that fell back to local handling.").unwrap();

    // --- Replication counters ---
    /// Replication RPCs issued to replica nodes.
    pub static ref REPLICATION_RPCS_TOTAL: Counter =
        register_counter!("citrinemq_replication_rpcs_total", "Total replication RPCs sent to replicas.").unwrap();
    /// Replication calls that exhausted their retries. Each increment means a
    /// replica is missing state the primary has committed.
    pub static ref REPLICATION_FAILURES_TOTAL: Counter =
        register_counter!("citrinemq_replication_failures_total", "Total replication calls abandoned after all retries.").unwrap();
    /// RPCs served on the inter-node endpoint.
    pub static ref RPC_REQUESTS_TOTAL: Counter =
        register_counter!("citrinemq_rpc_requests_total", "Total inter-node RPCs served.").unwrap();

    // --- Messaging counters ---
    /// Messages appended to topics on this node.
    pub static ref MESSAGES_PUBLISHED_TOTAL: Counter =
        register_counter!("citrinemq_messages_published_total", "Total messages published to topics on this node.").unwrap();
    /// Messages popped from queues on this node.
    pub static ref MESSAGES_CONSUMED_TOTAL: Counter =
        register_counter!("citrinemq_messages_consumed_total", "Total messages consumed from queues on this node.").unwrap();

    // --- Cluster gauges ---
    /// Number of configured peer nodes.
    pub static ref CLUSTER_PEERS: Gauge =
        register_gauge!("citrinemq_cluster_peers", "Number of configured peer nodes.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
