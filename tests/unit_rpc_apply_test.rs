use citrinemq::config::Config;
use citrinemq::core::replication::protocol::{RpcRequest, RpcStatus};
use citrinemq::core::replication::server::apply;
use citrinemq::core::state::ServerState;
use std::sync::Arc;
use tempfile::TempDir;

async fn node_state() -> (TempDir, Arc<ServerState>) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database_path = dir
        .path()
        .join("node.db")
        .to_string_lossy()
        .into_owned();
    let state = ServerState::initialize(config).await.unwrap();
    (dir, state)
}

fn topic_create(name: &str, owner: &str) -> RpcRequest {
    RpcRequest::TopicCreate {
        name: name.into(),
        owner: owner.into(),
    }
}

#[tokio::test]
async fn test_replicated_create_is_idempotent() {
    let (_dir, state) = node_state().await;
    let first = apply(&state, topic_create("news", "alice")).await;
    assert_eq!(first.status, RpcStatus::Success);
    // Re-applying from any number of peers converges on the same state.
    for _ in 0..3 {
        let again = apply(&state, topic_create("news", "alice")).await;
        assert_eq!(again.status, RpcStatus::AlreadyProcessed);
    }
    assert_eq!(
        state.store.topic_owner("news").await.unwrap().unwrap(),
        "alice"
    );
}

#[tokio::test]
async fn test_replicated_message_requires_topic_then_dedups() {
    let (_dir, state) = node_state().await;
    let message = RpcRequest::TopicMessage {
        topic: "news".into(),
        sender: "alice".into(),
        content: "hi".into(),
    };

    let missing = apply(&state, message.clone()).await;
    assert_eq!(missing.status, RpcStatus::NotFound);

    apply(&state, topic_create("news", "alice")).await;
    let stored = apply(&state, message.clone()).await;
    assert_eq!(stored.status, RpcStatus::Success);

    // A retried delivery of the same message is short-circuited.
    let replayed = apply(&state, message).await;
    assert_eq!(replayed.status, RpcStatus::AlreadyProcessed);
    assert_eq!(state.store.read_topic_messages("news").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replicated_delete_checks_requester() {
    let (_dir, state) = node_state().await;
    apply(&state, topic_create("news", "alice")).await;

    let denied = apply(
        &state,
        RpcRequest::TopicDelete {
            name: "news".into(),
            requester: "bob".into(),
        },
    )
    .await;
    assert_eq!(denied.status, RpcStatus::Error);
    assert!(state.store.topic_owner("news").await.unwrap().is_some());

    let by_system = apply(
        &state,
        RpcRequest::TopicDelete {
            name: "news".into(),
            requester: "system".into(),
        },
    )
    .await;
    assert_eq!(by_system.status, RpcStatus::Success);

    // Deleting an absent topic is success, so retries converge.
    let again = apply(
        &state,
        RpcRequest::TopicDelete {
            name: "news".into(),
            requester: "alice".into(),
        },
    )
    .await;
    assert_eq!(again.status, RpcStatus::Success);
}

#[tokio::test]
async fn test_replicated_enqueue_mirrors_topic_semantics() {
    let (_dir, state) = node_state().await;
    let enqueue = RpcRequest::QueueEnqueue {
        queue: "work".into(),
        sender: "alice".into(),
        content: "job-1".into(),
    };

    assert_eq!(apply(&state, enqueue.clone()).await.status, RpcStatus::NotFound);

    apply(
        &state,
        RpcRequest::QueueCreate {
            name: "work".into(),
            owner: "alice".into(),
        },
    )
    .await;
    assert_eq!(apply(&state, enqueue.clone()).await.status, RpcStatus::Success);
    assert_eq!(
        apply(&state, enqueue).await.status,
        RpcStatus::AlreadyProcessed
    );
    assert_eq!(state.store.read_queue_messages("work").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_calls_return_local_catalog() {
    let (_dir, state) = node_state().await;
    apply(&state, topic_create("alerts", "alice")).await;
    apply(&state, topic_create("news", "alice")).await;
    apply(
        &state,
        RpcRequest::QueueCreate {
            name: "work".into(),
            owner: "alice".into(),
        },
    )
    .await;

    let topics = apply(&state, RpcRequest::ListTopics).await;
    assert_eq!(topics.status, RpcStatus::Success);
    assert_eq!(topics.names, vec!["alerts", "news"]);

    let queues = apply(&state, RpcRequest::ListQueues).await;
    assert_eq!(queues.names, vec!["work"]);
}
