// src/server/http/auth.rs

//! Registration, login, and the user listing.

use super::{ApiError, ApiMessage};
use crate::core::CitrineError;
use crate::core::auth::{self, SYSTEM_PRINCIPAL};
use crate::core::state::ServerState;
use axum::extract::State;
use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<ServerState>>,
    Json(creds): Json<Credentials>,
) -> Result<Response, ApiError> {
    if creds.username == SYSTEM_PRINCIPAL {
        return Err(CitrineError::ReservedName(creds.username).into());
    }
    if creds.username.trim().is_empty() || creds.password.is_empty() {
        return Err(
            CitrineError::InvalidRequest("username and password are required".into()).into(),
        );
    }
    let hash = auth::hash_password(&creds.password)?;
    state.store.create_user(&creds.username, &hash).await?;
    Ok(Json(ApiMessage::new("User registered")).into_response())
}

pub async fn login(
    State(state): State<Arc<ServerState>>,
    Json(creds): Json<Credentials>,
) -> Result<Response, ApiError> {
    let user = state
        .store
        .get_user(&creds.username)
        .await?
        .ok_or(CitrineError::InvalidCredentials)?;
    if !auth::verify_password(&creds.password, &user.password_hash) {
        return Err(CitrineError::InvalidCredentials.into());
    }
    let token = state.tokens.issue(&user.username)?;
    Ok(Json(json!({ "token": token })).into_response())
}

pub async fn list_users(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(json!({ "users": users })).into_response())
}
