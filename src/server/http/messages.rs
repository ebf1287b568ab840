// src/server/http/messages.rs

//! Message endpoints: publish to and read from topics, enqueue to and
//! consume from queues.

use super::{ApiError, ApiMessage, RequestOptions};
use crate::core::CitrineError;
use crate::core::cluster::ResourceKind;
use crate::core::metrics;
use crate::core::replication::protocol::RpcRequest;
use crate::core::state::ServerState;
use crate::server::routing;
use axum::extract::{Path, Query, State};
use axum::Json;
use axum::response::{IntoResponse, Response};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub sender: String,
    pub content: String,
}

pub async fn publish(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(opts): Query<RequestOptions>,
    Json(body): Json<MessageBody>,
) -> Result<Response, ApiError> {
    state.tokens.verify(opts.token.as_deref())?;
    let assignment = state.assignment(ResourceKind::Topic, &name);

    if routing::should_forward(&state, &assignment, opts.redirected) {
        let payload = json!({ "sender": body.sender, "content": body.content });
        match routing::forward(
            &state,
            &assignment.primary,
            Method::POST,
            &format!("/messages/messages/topic/{name}"),
            opts.token.as_deref(),
            Some(&payload),
        )
        .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                metrics::FORWARD_FALLBACKS_TOTAL.inc();
                warn!(
                    "forwarding publish to topic '{name}' to {} failed: {e}; handling locally",
                    assignment.primary
                );
            }
        }
    }

    state
        .store
        .append_topic_message(&name, &body.sender, &body.content)
        .await?;
    // Record the append so a replica echoing it back (e.g. after a forward
    // fallback) is short-circuited instead of stored twice.
    state
        .replay_guard
        .record(ResourceKind::Topic, &name, &body.sender, &body.content);
    metrics::MESSAGES_PUBLISHED_TOTAL.inc();
    routing::replicate(
        &state,
        RpcRequest::TopicMessage {
            topic: name.clone(),
            sender: body.sender,
            content: body.content,
        },
        &assignment,
    )
    .await;
    Ok(Json(ApiMessage::new(format!("Message published to topic {name}"))).into_response())
}

pub async fn topic_messages(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(opts): Query<RequestOptions>,
) -> Result<Response, ApiError> {
    let assignment = state.assignment(ResourceKind::Topic, &name);

    if routing::should_forward(&state, &assignment, opts.redirected) {
        match routing::forward(
            &state,
            &assignment.primary,
            Method::GET,
            &format!("/messages/messages/topic/{name}"),
            None,
            None,
        )
        .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                metrics::FORWARD_FALLBACKS_TOTAL.inc();
                warn!(
                    "forwarding read of topic '{name}' to {} failed: {e}; reading locally",
                    assignment.primary
                );
            }
        }
    }

    let messages = state.store.read_topic_messages(&name).await?;
    Ok(Json(json!({ "messages": messages })).into_response())
}

pub async fn enqueue(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(opts): Query<RequestOptions>,
    Json(body): Json<MessageBody>,
) -> Result<Response, ApiError> {
    state.tokens.verify(opts.token.as_deref())?;
    let assignment = state.assignment(ResourceKind::Queue, &name);

    if routing::should_forward(&state, &assignment, opts.redirected) {
        let payload = json!({ "sender": body.sender, "content": body.content });
        match routing::forward(
            &state,
            &assignment.primary,
            Method::POST,
            &format!("/messages/messages/queue/{name}"),
            opts.token.as_deref(),
            Some(&payload),
        )
        .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                metrics::FORWARD_FALLBACKS_TOTAL.inc();
                warn!(
                    "forwarding send to queue '{name}' to {} failed: {e}; handling locally",
                    assignment.primary
                );
            }
        }
    }

    state
        .store
        .enqueue(&name, &body.sender, &body.content)
        .await?;
    state
        .replay_guard
        .record(ResourceKind::Queue, &name, &body.sender, &body.content);
    routing::replicate(
        &state,
        RpcRequest::QueueEnqueue {
            queue: name.clone(),
            sender: body.sender,
            content: body.content,
        },
        &assignment,
    )
    .await;
    Ok(Json(ApiMessage::new(format!("Message sent to queue {name}"))).into_response())
}

/// Pops the oldest message from a queue. Only the primary consumes; any
/// other node forwards, and the warm-standby copies on secondaries are never
/// popped. Unlike the other handlers there is no local fallback when the
/// forward fails: a pop is destructive and never replicated, so popping a
/// standby copy could hand the same message to two consumers. While the
/// primary is unreachable, consumes on its partition fail.
pub async fn consume(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(opts): Query<RequestOptions>,
) -> Result<Response, ApiError> {
    state.tokens.verify(opts.token.as_deref())?;
    let assignment = state.assignment(ResourceKind::Queue, &name);

    if routing::should_forward_consume(&state, &assignment, opts.redirected) {
        return match routing::forward(
            &state,
            &assignment.primary,
            Method::GET,
            &format!("/messages/messages/queue/{name}"),
            opts.token.as_deref(),
            None,
        )
        .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(
                    "forwarding consume of queue '{name}' to {} failed: {e}",
                    assignment.primary
                );
                Err(CitrineError::PeerUnreachable(format!(
                    "queue '{name}' primary {} is unreachable",
                    assignment.primary
                ))
                .into())
            }
        };
    }

    let message = state.store.pop_queue(&name).await?;
    if message.is_some() {
        metrics::MESSAGES_CONSUMED_TOTAL.inc();
    }
    Ok(Json(json!({ "message": message })).into_response())
}
