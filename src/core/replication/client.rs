// src/core/replication/client.rs

//! The RPC client side of the replication transport: a thin framed
//! connection plus the per-target retry policy used for replica fan-out.

use crate::config::Config;
use crate::core::CitrineError;
use crate::core::metrics;
use crate::core::replication::protocol::{self, RpcRequest, RpcResponse, RpcStatus};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CALL_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A framed connection to one peer's RPC endpoint.
pub struct RpcClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl RpcClient {
    /// Creates a TCP connection to the target node's RPC address with a timeout.
    pub async fn connect(addr: &str) -> Result<Self, CitrineError> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| CitrineError::PeerUnreachable(format!("connect timeout to {addr}")))?
            .map_err(|e| CitrineError::PeerUnreachable(format!("{addr}: {e}")))?;
        Ok(Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        })
    }

    /// Sends a single request frame and awaits the single reply frame,
    /// bounded by the per-RPC deadline.
    pub async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, CitrineError> {
        let frame = protocol::encode_request(request)?;
        timeout(CALL_TIMEOUT, async {
            self.framed
                .send(frame)
                .await
                .map_err(|e| CitrineError::PeerUnreachable(format!("send: {e}")))?;
            match self.framed.next().await {
                Some(Ok(bytes)) => protocol::decode_response(&bytes),
                Some(Err(e)) => Err(CitrineError::PeerUnreachable(format!("recv: {e}"))),
                None => Err(CitrineError::PeerUnreachable(
                    "connection closed by peer".to_string(),
                )),
            }
        })
        .await
        .map_err(|_| CitrineError::PeerUnreachable("rpc deadline exceeded".to_string()))?
    }
}

/// Propagates one operation to every target in the replica set, excluding
/// this node. Best-effort: failures are logged and counted, never surfaced
/// to the client whose request triggered the fan-out, and the local commit
/// stands regardless.
pub async fn replicate_to_targets(config: &Config, op: &RpcRequest, targets: &[String]) {
    for target in targets {
        if *target == config.cluster.self_host || target.trim().is_empty() {
            continue;
        }
        let Some(rpc_addr) = config.rpc_addr_for(target) else {
            warn!("no RPC address derivable for peer '{target}', skipping replication");
            continue;
        };
        if let Err(e) = replicate_to_target(&rpc_addr, op).await {
            metrics::REPLICATION_FAILURES_TOTAL.inc();
            warn!("replication to {target} ({rpc_addr}) abandoned: {e}");
        }
    }
}

/// One target: up to `MAX_ATTEMPTS` tries with a fixed backoff. A connect
/// timeout counts as a failed attempt.
async fn replicate_to_target(rpc_addr: &str, op: &RpcRequest) -> Result<(), CitrineError> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            sleep(RETRY_BACKOFF).await;
        }
        match replicate_once(rpc_addr, op).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!("replication attempt {attempt}/{MAX_ATTEMPTS} to {rpc_addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| CitrineError::PeerUnreachable(rpc_addr.to_string())))
}

async fn replicate_once(rpc_addr: &str, op: &RpcRequest) -> Result<(), CitrineError> {
    let mut client = RpcClient::connect(rpc_addr).await?;
    metrics::REPLICATION_RPCS_TOTAL.inc();
    let response = client.call(op).await?;
    match response.status {
        RpcStatus::Success | RpcStatus::AlreadyProcessed => Ok(()),
        RpcStatus::NotFound => {
            // The callee is missing the topic/queue this message belongs to:
            // create it there once, then retry the original operation.
            let create = create_for(op).ok_or_else(|| {
                CitrineError::Replication(format!("unexpected NotFound from {rpc_addr}"))
            })?;
            client.call(&create).await?;
            let retry = client.call(op).await?;
            match retry.status {
                RpcStatus::Success | RpcStatus::AlreadyProcessed => Ok(()),
                other => Err(CitrineError::Replication(format!(
                    "{rpc_addr} still rejects after create: {other:?}"
                ))),
            }
        }
        RpcStatus::Error => Err(CitrineError::Replication(format!(
            "{rpc_addr} rejected the operation: {}",
            response.message.unwrap_or_default()
        ))),
    }
}

/// The create call that repairs a `NotFound` for a message operation. The
/// sender becomes the owner on the repaired replica, matching what a later
/// catalog sync would record.
fn create_for(op: &RpcRequest) -> Option<RpcRequest> {
    match op {
        RpcRequest::TopicMessage { topic, sender, .. } => Some(RpcRequest::TopicCreate {
            name: topic.clone(),
            owner: sender.clone(),
        }),
        RpcRequest::QueueEnqueue { queue, sender, .. } => Some(RpcRequest::QueueCreate {
            name: queue.clone(),
            owner: sender.clone(),
        }),
        _ => None,
    }
}

/// Fetches the peer's catalog for one resource kind (`ListTopics` or
/// `ListQueues`). Used by the startup sync.
pub async fn fetch_names(rpc_addr: &str, request: RpcRequest) -> Result<Vec<String>, CitrineError> {
    let mut client = RpcClient::connect(rpc_addr).await?;
    let response = client.call(&request).await?;
    match response.status {
        RpcStatus::Success => Ok(response.names),
        other => Err(CitrineError::Replication(format!(
            "list call to {rpc_addr} failed: {other:?}"
        ))),
    }
}
