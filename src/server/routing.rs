// src/server/routing.rs

//! The routing half of the request router: decide whether a request is
//! served locally or forwarded to the partition primary, perform the
//! forward, fan replicated operations out to the replica set, and aggregate
//! list results across the cluster.

use crate::core::CitrineError;
use crate::core::cluster::Assignment;
use crate::core::metrics;
use crate::core::replication::client::replicate_to_targets;
use crate::core::replication::protocol::RpcRequest;
use crate::core::state::ServerState;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_TIMEOUT: Duration = Duration::from_secs(3);

/// Whether a request must be forwarded to the primary: partitioning is on,
/// the request was not already redirected, and this node holds no copy. A
/// request carrying `redirected=true` is always handled locally, which is
/// what bounds every request to at most two hops.
pub fn should_forward(state: &ServerState, assignment: &Assignment, redirected: bool) -> bool {
    state.config.cluster.partitioning_enabled && !redirected && !assignment.is_responsible()
}

/// Consume is stricter: only the primary pops, so secondaries forward too.
pub fn should_forward_consume(
    state: &ServerState,
    assignment: &Assignment,
    redirected: bool,
) -> bool {
    state.config.cluster.partitioning_enabled && !redirected && !assignment.is_primary
}

/// Forwards the request to the primary with `redirected=true` and returns
/// the downstream response verbatim (status and body). The caller falls back
/// to local handling when this fails.
pub async fn forward(
    state: &ServerState,
    primary: &str,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<&serde_json::Value>,
) -> Result<Response, CitrineError> {
    let url = format!("http://{primary}{path}");
    debug!("forwarding {method} {path} to primary {primary}");
    let mut request = state
        .http_client
        .request(method, url)
        .timeout(FORWARD_TIMEOUT)
        .query(&[("redirected", "true")]);
    if let Some(token) = token {
        request = request.query(&[("token", token)]);
    }
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;
    metrics::FORWARDED_REQUESTS_TOTAL.inc();

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = response.bytes().await?;
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .map_err(|e| CitrineError::Internal(format!("forward response: {e}")))
}

/// Fans one operation out to the rest of the replica set. Best-effort; the
/// local commit that preceded this call stands regardless.
pub async fn replicate(state: &ServerState, op: RpcRequest, assignment: &Assignment) {
    let targets = state.replication_targets(assignment);
    replicate_to_targets(&state.config, &op, &targets).await;
}

/// Builds the cluster-wide name list: local names first, then every peer's
/// local names (queried with `redirected=true` so peers do not fan out
/// again), deduplicated in first-seen order.
pub async fn aggregated_names(
    state: &ServerState,
    path: &str,
    field: &str,
    local: Vec<String>,
) -> Vec<String> {
    let mut all = local;
    for peer in &state.config.cluster.nodes {
        let url = format!("http://{peer}{path}");
        let response = state
            .http_client
            .get(url)
            .query(&[("redirected", "true")])
            .timeout(LIST_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                let Ok(value) = response.json::<serde_json::Value>().await else {
                    warn!("malformed list response from {peer}");
                    continue;
                };
                let Some(names) = value.get(field).and_then(|v| v.as_array()) else {
                    continue;
                };
                for name in names.iter().filter_map(|v| v.as_str()) {
                    if !all.iter().any(|n| n == name) {
                        all.push(name.to_string());
                    }
                }
            }
            Ok(response) => debug!("list request to {peer} returned {}", response.status()),
            Err(e) => warn!("failed to list from {peer}: {e}"),
        }
    }
    all
}
