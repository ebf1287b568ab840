// src/core/replication/server.rs

//! The RPC server side of the replication transport: accepts framed
//! connections from peers and applies replicated operations against the
//! local store.

use crate::core::auth::SYSTEM_PRINCIPAL;
use crate::core::cluster::ResourceKind;
use crate::core::metrics;
use crate::core::replication::protocol::{self, RpcRequest, RpcResponse};
use crate::core::state::ServerState;
use crate::core::CitrineError;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

/// The accept loop. Each peer connection is served on its own task until the
/// peer disconnects or shutdown is signaled.
pub async fn run(
    state: Arc<ServerState>,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Replication RPC endpoint listening on {addr}.");
    }
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = state.clone();
                    tokio::spawn(handle_connection(state, stream, peer));
                }
                Err(e) => warn!("failed to accept RPC connection: {e}"),
            },
            _ = shutdown_rx.recv() => {
                info!("Replication RPC endpoint shutting down.");
                break;
            }
        }
    }
}

/// One peer connection: a request/response loop over length-delimited frames.
async fn handle_connection(state: Arc<ServerState>, stream: TcpStream, peer: SocketAddr) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    while let Some(frame) = framed.next().await {
        let bytes = match frame {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("RPC framing error from {peer}: {e}");
                break;
            }
        };
        let response = match protocol::decode_request(&bytes) {
            Ok(request) => apply(&state, request).await,
            Err(e) => RpcResponse::error(format!("malformed request: {e}")),
        };
        let out = match protocol::encode_response(&response) {
            Ok(out) => out,
            Err(e) => {
                warn!("failed to encode RPC response for {peer}: {e}");
                break;
            }
        };
        if let Err(e) = framed.send(out).await {
            debug!("failed to reply to {peer}: {e}");
            break;
        }
    }
}

/// Applies one replicated operation. Creates are idempotent, deletes treat a
/// missing name as done, and message appends are filtered through the replay
/// guard so re-delivered operations short-circuit to `AlreadyProcessed`.
pub async fn apply(state: &ServerState, request: RpcRequest) -> RpcResponse {
    metrics::RPC_REQUESTS_TOTAL.inc();
    match request {
        RpcRequest::TopicCreate { name, owner } => {
            match state.store.create_topic(&name, &owner).await {
                Ok(()) => RpcResponse::success(),
                Err(CitrineError::AlreadyExists(..)) => RpcResponse::already_processed(),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::TopicDelete { name, requester } => {
            match state.store.topic_owner(&name).await {
                Ok(None) => RpcResponse::success(),
                Ok(Some(owner)) if requester == owner || requester == SYSTEM_PRINCIPAL => {
                    match state.store.delete_topic(&name).await {
                        Ok(()) => RpcResponse::success(),
                        Err(e) => RpcResponse::error(e.to_string()),
                    }
                }
                Ok(Some(_)) => RpcResponse::error("requester does not own the topic"),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::TopicMessage {
            topic,
            sender,
            content,
        } => {
            if state
                .replay_guard
                .seen(ResourceKind::Topic, &topic, &sender, &content)
            {
                return RpcResponse::already_processed();
            }
            match state
                .store
                .append_topic_message(&topic, &sender, &content)
                .await
            {
                Ok(()) => {
                    state
                        .replay_guard
                        .record(ResourceKind::Topic, &topic, &sender, &content);
                    RpcResponse::success()
                }
                Err(CitrineError::NotFound(..)) => RpcResponse::not_found(),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::QueueCreate { name, owner } => {
            match state.store.create_queue(&name, &owner).await {
                Ok(()) => RpcResponse::success(),
                Err(CitrineError::AlreadyExists(..)) => RpcResponse::already_processed(),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::QueueDelete { name, requester } => {
            match state.store.queue_owner(&name).await {
                Ok(None) => RpcResponse::success(),
                Ok(Some(owner)) if requester == owner || requester == SYSTEM_PRINCIPAL => {
                    match state.store.delete_queue(&name).await {
                        Ok(()) => RpcResponse::success(),
                        Err(e) => RpcResponse::error(e.to_string()),
                    }
                }
                Ok(Some(_)) => RpcResponse::error("requester does not own the queue"),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::QueueEnqueue {
            queue,
            sender,
            content,
        } => {
            if state
                .replay_guard
                .seen(ResourceKind::Queue, &queue, &sender, &content)
            {
                return RpcResponse::already_processed();
            }
            match state.store.enqueue(&queue, &sender, &content).await {
                Ok(()) => {
                    state
                        .replay_guard
                        .record(ResourceKind::Queue, &queue, &sender, &content);
                    RpcResponse::success()
                }
                Err(CitrineError::NotFound(..)) => RpcResponse::not_found(),
                Err(e) => RpcResponse::error(e.to_string()),
            }
        }
        RpcRequest::ListTopics => match state.store.list_topics().await {
            Ok(names) => RpcResponse::with_names(names),
            Err(e) => RpcResponse::error(e.to_string()),
        },
        RpcRequest::ListQueues => match state.store.list_queues().await {
            Ok(names) => RpcResponse::with_names(names),
            Err(e) => RpcResponse::error(e.to_string()),
        },
    }
}
