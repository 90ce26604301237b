//! Consistent-hash ring affinity mapping.
//!
//! `partition_of(key)` reuses the existing FNV-1a partition hash
//! ([`crate::partition::hash_to_partition`]); `nodes_for` places each
//! partition on a ring built from virtual nodes per live physical node and
//! walks clockwise from the partition's ring position to pick owner and
//! backups, breaking position ties by node id so the walk order is total.
//!
//! This is a different algorithm from `topgun_server::cluster::assignment`'s
//! modulo-based `compute_assignment`: the ring only perturbs the ownership of
//! partitions adjacent to a joining/leaving node's virtual points, while
//! modulo distribution reshuffles almost every partition on any membership
//! change. Both are real distribution strategies used in this codebase for
//! different owners -- the ring for per-key affinity, modulo for spreading
//! orchestrator service instances across nodes.

use std::collections::HashSet;

use crate::hash::fnv1a_hash;
use crate::partition::hash_to_partition;

/// Number of virtual points placed on the ring per live physical node.
/// Higher values smooth the distribution at the cost of a larger sorted ring.
pub const VIRTUAL_NODES_PER_NODE: u32 = 16;

/// Computes the partition a key belongs to.
///
/// Thin alias over [`crate::partition::hash_to_partition`]; kept as its own
/// named entry point because the affinity map is the contract callers should
/// depend on, not the underlying hash scheme.
#[must_use]
pub fn partition_of(key: &str) -> u32 {
    hash_to_partition(key)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RingPoint {
    position: u32,
    node_id: String,
}

fn build_ring(live_nodes: &[String], topology_version: u64) -> Vec<RingPoint> {
    let mut points = Vec::with_capacity(live_nodes.len() * VIRTUAL_NODES_PER_NODE as usize);
    for node_id in live_nodes {
        for vn in 0..VIRTUAL_NODES_PER_NODE {
            let label = format!("{node_id}#{vn}@{topology_version}");
            points.push(RingPoint { position: fnv1a_hash(&label), node_id: node_id.clone() });
        }
    }
    points.sort();
    points
}

/// Returns the ordered list of nodes that should hold `partition`: the owner
/// first, then up to `replica_count - 1` distinct backups, walking the ring
/// clockwise from the partition's hashed position.
///
/// The ring (and therefore ownership) is reseeded by `topology_version`, so a
/// membership change only needs to be re-run with the new version rather than
/// tracked incrementally. Returns an empty `Vec` if `live_nodes` is empty.
#[must_use]
pub fn nodes_for(
    partition: u32,
    topology_version: u64,
    live_nodes: &[String],
    replica_count: usize,
) -> Vec<String> {
    if live_nodes.is_empty() {
        return Vec::new();
    }

    let ring = build_ring(live_nodes, topology_version);
    let target = fnv1a_hash(&format!("partition-{partition}"));
    let start = ring.partition_point(|p| p.position < target);

    let wanted = replica_count.min(live_nodes.len());
    let mut seen = HashSet::with_capacity(wanted);
    let mut result = Vec::with_capacity(wanted);

    for i in 0..ring.len() {
        let point = &ring[(start + i) % ring.len()];
        if seen.insert(point.node_id.clone()) {
            result.push(point.node_id.clone());
            if result.len() == wanted {
                break;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partition_of_matches_partition_hash() {
        assert_eq!(partition_of("hello"), hash_to_partition("hello"));
    }

    #[test]
    fn empty_live_nodes_yields_empty_assignment() {
        assert!(nodes_for(0, 1, &[], 2).is_empty());
    }

    #[test]
    fn single_node_owns_every_partition_with_no_backups() {
        let live = nodes(&["node-1"]);
        for pid in 0..50 {
            let assigned = nodes_for(pid, 1, &live, 2);
            assert_eq!(assigned, vec!["node-1".to_string()]);
        }
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let live = nodes(&["node-a", "node-b", "node-c"]);
        let a = nodes_for(42, 3, &live, 2);
        let b = nodes_for(42, 3, &live, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn replica_count_is_respected_and_distinct() {
        let live = nodes(&["node-a", "node-b", "node-c", "node-d"]);
        for pid in 0..30 {
            let assigned = nodes_for(pid, 7, &live, 3);
            assert_eq!(assigned.len(), 3);
            let unique: HashSet<_> = assigned.iter().collect();
            assert_eq!(unique.len(), 3, "backups must be distinct nodes");
        }
    }

    #[test]
    fn replica_count_clamped_to_live_node_count() {
        let live = nodes(&["node-a", "node-b"]);
        let assigned = nodes_for(0, 1, &live, 5);
        assert_eq!(assigned.len(), 2);
    }

    #[test]
    fn distribution_is_roughly_even_across_partitions() {
        let live = nodes(&["node-a", "node-b", "node-c"]);
        let mut owner_counts = std::collections::HashMap::new();
        for pid in 0..271 {
            let owner = nodes_for(pid, 1, &live, 1).into_iter().next().unwrap();
            *owner_counts.entry(owner).or_insert(0u32) += 1;
        }
        assert_eq!(owner_counts.len(), 3);
        for count in owner_counts.values() {
            assert!(*count > 40, "node owns suspiciously few partitions: {count}");
        }
    }

    #[test]
    fn new_topology_version_can_reassign_ownership() {
        let live = nodes(&["node-a", "node-b", "node-c"]);
        let before: Vec<_> = (0..271).map(|pid| nodes_for(pid, 1, &live, 1)).collect();
        let after: Vec<_> = (0..271).map(|pid| nodes_for(pid, 2, &live, 1)).collect();
        assert_ne!(before, after, "bumping topology_version reseeds the ring");
    }
}
