use citrinemq::CitrineError;
use citrinemq::core::storage::Store;
use std::collections::BTreeSet;
use tempfile::TempDir;

async fn open_store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("node.db")).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn test_create_topic_rejects_duplicate() {
    let (_dir, store) = open_store().await;
    store.create_topic("news", "alice").await.unwrap();
    let err = store.create_topic("news", "bob").await.unwrap_err();
    assert!(matches!(err, CitrineError::AlreadyExists("topic", _)));
    // The first owner stands.
    assert_eq!(store.topic_owner("news").await.unwrap().unwrap(), "alice");
}

#[tokio::test]
async fn test_delete_topic_is_idempotent() {
    let (_dir, store) = open_store().await;
    store.delete_topic("ghost").await.unwrap();
    store.create_topic("news", "alice").await.unwrap();
    store.delete_topic("news").await.unwrap();
    store.delete_topic("news").await.unwrap();
    assert!(store.list_topics().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_append_preserves_order_and_requires_topic() {
    let (_dir, store) = open_store().await;
    let err = store
        .append_topic_message("missing", "alice", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, CitrineError::NotFound("topic", _)));

    store.create_topic("news", "alice").await.unwrap();
    for content in ["one", "two", "three"] {
        store
            .append_topic_message("news", "alice", content)
            .await
            .unwrap();
    }
    let messages = store.read_topic_messages("news").await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_delete_topic_drops_its_log() {
    let (_dir, store) = open_store().await;
    store.create_topic("news", "alice").await.unwrap();
    store
        .append_topic_message("news", "alice", "hello")
        .await
        .unwrap();
    store.delete_topic("news").await.unwrap();

    store.create_topic("news", "alice").await.unwrap();
    assert!(store.read_topic_messages("news").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_pop_is_fifo() {
    let (_dir, store) = open_store().await;
    store.create_queue("work", "alice").await.unwrap();
    for content in ["m1", "m2", "m3"] {
        store.enqueue("work", "alice", content).await.unwrap();
    }
    for expected in ["m1", "m2", "m3"] {
        let message = store.pop_queue("work").await.unwrap().unwrap();
        assert_eq!(message.content, expected);
    }
    assert!(store.pop_queue("work").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pop_missing_queue_is_not_found() {
    let (_dir, store) = open_store().await;
    let err = store.pop_queue("missing").await.unwrap_err();
    assert!(matches!(err, CitrineError::NotFound("queue", _)));
}

#[tokio::test]
async fn test_concurrent_pops_deliver_each_message_at_most_once() {
    let (_dir, store) = open_store().await;
    store.create_queue("work", "alice").await.unwrap();
    let expected: BTreeSet<String> = (0..20).map(|i| format!("msg-{i}")).collect();
    for content in &expected {
        store.enqueue("work", "alice", content).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut drained = Vec::new();
            while let Some(message) = store.pop_queue("work").await.unwrap() {
                drained.push(message.content);
            }
            drained
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    assert_eq!(all.len(), expected.len(), "a message was popped twice");
    let unique: BTreeSet<String> = all.into_iter().collect();
    assert_eq!(unique, expected);
}

#[tokio::test]
async fn test_user_round_trip() {
    let (_dir, store) = open_store().await;
    store.create_user("alice", "hash-a").await.unwrap();
    let err = store.create_user("alice", "hash-b").await.unwrap_err();
    assert!(matches!(err, CitrineError::AlreadyExists("user", _)));

    let user = store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.password_hash, "hash-a");
    assert!(store.get_user("nobody").await.unwrap().is_none());

    store.create_user("bob", "hash-c").await.unwrap();
    assert_eq!(store.list_users().await.unwrap(), vec!["alice", "bob"]);
}
