use citrinemq::core::cluster::{PartitionMap, ResourceKind};
use proptest::prelude::*;

const NODES: [&str; 3] = ["localhost:8000", "localhost:8001", "localhost:8002"];

fn map_for(self_addr: &str, replication_factor: usize) -> PartitionMap {
    let peers: Vec<String> = NODES
        .iter()
        .filter(|n| **n != self_addr)
        .map(|n| n.to_string())
        .collect();
    PartitionMap::new(self_addr, &peers, replication_factor)
}

#[test]
fn test_assignment_agrees_across_viewpoints() {
    let maps: Vec<PartitionMap> = NODES.iter().map(|n| map_for(n, 2)).collect();
    for name in ["news", "alerts", "work", "a", ""] {
        for kind in [ResourceKind::Topic, ResourceKind::Queue] {
            let reference = maps[0].assignment(kind, name);
            for map in &maps[1..] {
                let assignment = map.assignment(kind, name);
                assert_eq!(assignment.primary, reference.primary);
                assert_eq!(assignment.secondaries, reference.secondaries);
            }
        }
    }
}

#[test]
fn test_exactly_one_node_is_primary() {
    let maps: Vec<PartitionMap> = NODES.iter().map(|n| map_for(n, 2)).collect();
    for name in ["news", "work", "metrics"] {
        let primaries = maps
            .iter()
            .filter(|m| m.assignment(ResourceKind::Topic, name).is_primary)
            .count();
        assert_eq!(primaries, 1);
    }
}

#[test]
fn test_replication_factor_one_has_single_owner() {
    let map = map_for("localhost:8000", 1);
    let assignment = map.assignment(ResourceKind::Topic, "solo");
    assert!(assignment.secondaries.is_empty());
    assert_eq!(assignment.all_responsible(), vec![assignment.primary]);
}

#[test]
fn test_factor_beyond_ring_size_covers_all_nodes() {
    let map = map_for("localhost:8000", 5);
    let assignment = map.assignment(ResourceKind::Topic, "everywhere");
    let mut responsible = assignment.all_responsible();
    responsible.sort();
    let mut expected: Vec<String> = NODES.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(responsible, expected);
}

#[test]
fn test_topic_and_queue_of_same_name_map_differently() {
    // The queue offset shifts the ring position by one, so with more than
    // one node the primaries always differ.
    let map = map_for("localhost:8000", 2);
    let topic = map.assignment(ResourceKind::Topic, "orders");
    let queue = map.assignment(ResourceKind::Queue, "orders");
    assert_ne!(topic.primary, queue.primary);
}

#[test]
fn test_responsibility_flags_match_membership() {
    for self_addr in NODES {
        let map = map_for(self_addr, 2);
        for name in ["news", "work", "x"] {
            let assignment = map.assignment(ResourceKind::Queue, name);
            assert_eq!(assignment.is_primary, assignment.primary == self_addr);
            assert_eq!(
                assignment.is_secondary,
                assignment.secondaries.iter().any(|n| n == self_addr)
            );
        }
    }
}

proptest! {
    #[test]
    fn prop_assignment_is_stable_and_well_formed(name in "[a-zA-Z0-9_./-]{0,48}", factor in 1usize..6) {
        let first = map_for("localhost:8001", factor);
        let second = map_for("localhost:8002", factor);
        let a = first.assignment(ResourceKind::Topic, &name);
        let b = second.assignment(ResourceKind::Topic, &name);
        prop_assert_eq!(&a.primary, &b.primary);
        prop_assert_eq!(&a.secondaries, &b.secondaries);

        let responsible = a.all_responsible();
        prop_assert_eq!(responsible.len(), factor.min(NODES.len()));
        prop_assert_eq!(&responsible[0], &a.primary);
        let mut unique = responsible.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), responsible.len());
    }
}
