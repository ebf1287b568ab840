// src/server/http/queues.rs

//! Queue catalog endpoints: create, delete, list.

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
pub struct CreateQueueBody {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
}

pub async fn create(
    State(state): State<Arc<ServerState>>,
    Query(opts): Query<RequestOptions>,
    Json(body): Json<CreateQueueBody>,
) -> Result<Response, ApiError> {
    let user = state.tokens.verify(opts.token.as_deref())?;
    let assignment = state.assignment(ResourceKind::Queue, &body.name);

    if routing::should_forward(&state, &assignment, opts.redirected) {
        let payload = json!({ "name": body.name, "owner": user });
        match routing::forward(
            &state,
            &assignment.primary,
            Method::POST,
            "/messages/queues",
            opts.token.as_deref(),
            Some(&payload),
        )
        .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                metrics::FORWARD_FALLBACKS_TOTAL.inc();
                warn!(
                    "forwarding create of queue '{}' to {} failed: {e}; handling locally",
                    body.name, assignment.primary
                );
            }
        }
    }

    state.store.create_queue(&body.name, &user).await?;
    routing::replicate(
        &state,
        RpcRequest::QueueCreate {
            name: body.name.clone(),
            owner: user,
        },
        &assignment,
    )
    .await;
    Ok(Json(ApiMessage::new(format!("Queue {} created", body.name))).into_response())
}

pub async fn remove(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(opts): Query<RequestOptions>,
) -> Result<Response, ApiError> {
    let user = state.tokens.verify(opts.token.as_deref())?;
    let assignment = state.assignment(ResourceKind::Queue, &name);

    if routing::should_forward(&state, &assignment, opts.redirected) {
        match routing::forward(
            &state,
            &assignment.primary,
            Method::DELETE,
            &format!("/messages/queues/{name}"),
            opts.token.as_deref(),
            None,
        )
        .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                metrics::FORWARD_FALLBACKS_TOTAL.inc();
                warn!(
                    "forwarding delete of queue '{name}' to {} failed: {e}; handling locally",
                    assignment.primary
                );
            }
        }
    }

    let owner = state
        .store
        .queue_owner(&name)
        .await?
        .ok_or_else(|| CitrineError::NotFound("queue", name.clone()))?;
    if owner != user {
        return Err(CitrineError::Forbidden(format!("delete queue '{name}'")).into());
    }
    state.store.delete_queue(&name).await?;
    routing::replicate(
        &state,
        RpcRequest::QueueDelete {
            name: name.clone(),
            requester: user,
        },
        &assignment,
    )
    .await;
    Ok(Json(ApiMessage::new(format!("Queue {name} deleted"))).into_response())
}

pub async fn list(
    State(state): State<Arc<ServerState>>,
    Query(opts): Query<RequestOptions>,
) -> Result<Response, ApiError> {
    let local = state.store.list_queues().await?;
    let queues = if state.config.cluster.partitioning_enabled && !opts.redirected {
        routing::aggregated_names(&state, "/messages/queues", "queues", local).await
    } else {
        local
    };
    Ok(Json(json!({ "queues": queues })).into_response())
}
