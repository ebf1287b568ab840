// src/server/http/mod.rs

//! The public HTTP surface: route table, shared request/response shapes,
//! and the error-to-status mapping.

use crate::core::CitrineError;
use crate::core::state::ServerState;
use axum::Router;
use axum::http::StatusCode;
use axum::Json;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

pub mod auth;
pub mod messages;
pub mod queues;
pub mod topics;

/// Builds the public API router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/users", get(auth::list_users))
        .route("/messages/topics", post(topics::create).get(topics::list))
        .route("/messages/topics/{name}", axum::routing::delete(topics::remove))
        .route("/messages/queues", post(queues::create).get(queues::list))
        .route("/messages/queues/{name}", axum::routing::delete(queues::remove))
        .route(
            "/messages/messages/topic/{name}",
            post(messages::publish).get(messages::topic_messages),
        )
        .route(
            "/messages/messages/queue/{name}",
            post(messages::enqueue).get(messages::consume),
        )
        .with_state(state)
}

/// Query parameters shared by the public endpoints: the access token and the
/// internal redirection marker set on cluster-to-cluster forwards.
#[derive(Debug, Deserialize)]
pub struct RequestOptions {
    pub token: Option<String>,
    #[serde(default)]
    pub redirected: bool,
}

/// The `{"message": …}` body returned by mutating endpoints.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Adapter that turns a `CitrineError` into an HTTP response at the API
/// boundary.
#[derive(Debug)]
pub struct ApiError(pub CitrineError);

impl From<CitrineError> for ApiError {
    fn from(e: CitrineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CitrineError::AuthRequired
            | CitrineError::InvalidToken
            | CitrineError::TokenExpired
            | CitrineError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            CitrineError::Forbidden(_) => StatusCode::FORBIDDEN,
            CitrineError::NotFound(..) => StatusCode::NOT_FOUND,
            CitrineError::AlreadyExists(..)
            | CitrineError::ReservedName(_)
            | CitrineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CitrineError::PeerUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
