// src/core/replication/protocol.rs

//! Wire format of the inter-node RPC surface: bincode-encoded request and
//! response messages inside length-delimited frames.

use crate::core::CitrineError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One replication or sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum RpcRequest {
    TopicCreate {
        name: String,
        owner: String,
    },
    TopicDelete {
        name: String,
        requester: String,
    },
    TopicMessage {
        topic: String,
        sender: String,
        content: String,
    },
    QueueCreate {
        name: String,
        owner: String,
    },
    QueueDelete {
        name: String,
        requester: String,
    },
    QueueEnqueue {
        queue: String,
        sender: String,
        content: String,
    },
    ListTopics,
    ListQueues,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum RpcStatus {
    Success,
    Error,
    /// The addressed topic/queue does not exist on the callee. The caller
    /// answers with a single create-then-retry.
    NotFound,
    /// The callee already applied this operation (or already holds the
    /// resource); the caller treats it as success.
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct RpcResponse {
    pub status: RpcStatus,
    pub message: Option<String>,
    /// Names carried by `ListTopics`/`ListQueues` replies; empty otherwise.
    pub names: Vec<String>,
}

impl RpcResponse {
    pub fn success() -> Self {
        Self {
            status: RpcStatus::Success,
            message: None,
            names: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RpcStatus::Error,
            message: Some(message.into()),
            names: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: RpcStatus::NotFound,
            message: None,
            names: Vec::new(),
        }
    }

    pub fn already_processed() -> Self {
        Self {
            status: RpcStatus::AlreadyProcessed,
            message: None,
            names: Vec::new(),
        }
    }

    pub fn with_names(names: Vec<String>) -> Self {
        Self {
            status: RpcStatus::Success,
            message: None,
            names,
        }
    }
}

pub fn encode_request(request: &RpcRequest) -> Result<Bytes, CitrineError> {
    let bytes = bincode::encode_to_vec(request, bincode::config::standard())?;
    Ok(Bytes::from(bytes))
}

pub fn decode_request(frame: &[u8]) -> Result<RpcRequest, CitrineError> {
    let (request, _) = bincode::decode_from_slice(frame, bincode::config::standard())?;
    Ok(request)
}

pub fn encode_response(response: &RpcResponse) -> Result<Bytes, CitrineError> {
    let bytes = bincode::encode_to_vec(response, bincode::config::standard())?;
    Ok(Bytes::from(bytes))
}

pub fn decode_response(frame: &[u8]) -> Result<RpcResponse, CitrineError> {
    let (response, _) = bincode::decode_from_slice(frame, bincode::config::standard())?;
    Ok(response)
}
