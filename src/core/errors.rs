// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing all possible failures within the broker.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum CitrineError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage Error: {0}")]
    Store(String),

    #[error("{0} '{1}' not found")]
    NotFound(&'static str, String),

    #[error("{0} '{1}' already exists")]
    AlreadyExists(&'static str, String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username '{0}' is reserved")]
    ReservedName(String),

    #[error("Not authorized to {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Replication protocol error: {0}")]
    Protocol(String),

    #[error("Replication Error: {0}")]
    Replication(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// --- From trait implementations for easy error conversion ---

impl From<rusqlite::Error> for CitrineError {
    fn from(e: rusqlite::Error) -> Self {
        CitrineError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for CitrineError {
    fn from(e: reqwest::Error) -> Self {
        CitrineError::HttpClientError(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for CitrineError {
    fn from(e: bincode::error::EncodeError) -> Self {
        CitrineError::Protocol(format!("encode: {e}"))
    }
}

impl From<bincode::error::DecodeError> for CitrineError {
    fn from(e: bincode::error::DecodeError) -> Self {
        CitrineError::Protocol(format!("decode: {e}"))
    }
}

impl From<jsonwebtoken::errors::Error> for CitrineError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => CitrineError::TokenExpired,
            _ => CitrineError::InvalidToken,
        }
    }
}

impl From<argon2::password_hash::Error> for CitrineError {
    fn from(e: argon2::password_hash::Error) -> Self {
        CitrineError::Internal(format!("password hash: {e}"))
    }
}

impl From<serde_json::Error> for CitrineError {
    fn from(e: serde_json::Error) -> Self {
        CitrineError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}
