use citrinemq::core::cluster::ResourceKind;
use citrinemq::core::replication::ReplayGuard;

#[test]
fn test_recorded_operation_is_seen() {
    let guard = ReplayGuard::new();
    assert!(!guard.seen(ResourceKind::Topic, "news", "alice", "hi"));
    guard.record(ResourceKind::Topic, "news", "alice", "hi");
    assert!(guard.seen(ResourceKind::Topic, "news", "alice", "hi"));
}

#[test]
fn test_kind_distinguishes_operations() {
    let guard = ReplayGuard::new();
    guard.record(ResourceKind::Topic, "orders", "alice", "hi");
    assert!(!guard.seen(ResourceKind::Queue, "orders", "alice", "hi"));
}

#[test]
fn test_field_boundaries_do_not_collide() {
    let guard = ReplayGuard::new();
    guard.record(ResourceKind::Topic, "ab", "c", "x");
    assert!(!guard.seen(ResourceKind::Topic, "a", "bc", "x"));
}

#[test]
fn test_capacity_evicts_least_recent() {
    let guard = ReplayGuard::with_capacity(2);
    guard.record(ResourceKind::Topic, "t", "s", "first");
    guard.record(ResourceKind::Topic, "t", "s", "second");
    guard.record(ResourceKind::Topic, "t", "s", "third");
    assert!(!guard.seen(ResourceKind::Topic, "t", "s", "first"));
    assert!(guard.seen(ResourceKind::Topic, "t", "s", "second"));
    assert!(guard.seen(ResourceKind::Topic, "t", "s", "third"));
}
