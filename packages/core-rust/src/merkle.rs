//! MerkleTree and `ORMapMerkleTree` for efficient delta synchronization.
//!
//! Both trees use a prefix trie structure keyed by hex digits of the FNV-1a hash
//! of entry keys. The trie depth (default 3) determines bucket granularity.
//! Nodes compare root hashes to identify differing subtrees, then walk down
//! to discover the specific keys that need synchronization.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::hash::{combine_hashes, fnv1a_hash};

/// One node of the prefix trie, addressed by a path of hex digits from the root.
#[derive(Debug, Clone)]
pub struct MerkleNode {
    /// Combined hash of this node's subtree.
    pub hash: u32,
    /// Child nodes keyed by the next hex digit of the routing path.
    pub children: BTreeMap<char, MerkleNode>,
}

impl MerkleNode {
    fn empty() -> Self {
        Self { hash: 0, children: BTreeMap::new() }
    }
}

/// Shared trie implementation backing both [`MerkleTree`] and [`ORMapMerkleTree`].
///
/// Rebuilds the whole trie on every mutation. Entry counts per map are small
/// enough (bounded by partition size) that this is simpler and safer than
/// incremental path updates, at the cost of O(n log n) per write.
#[derive(Debug, Clone)]
struct Trie {
    depth: usize,
    leaves: HashMap<String, u32>,
    root: MerkleNode,
}

impl Trie {
    fn new(depth: usize) -> Self {
        let mut trie = Self { depth, leaves: HashMap::new(), root: MerkleNode::empty() };
        trie.rebuild();
        trie
    }

    fn update(&mut self, key: &str, item_hash: u32) {
        self.leaves.insert(key.to_string(), item_hash);
        self.rebuild();
    }

    fn remove(&mut self, key: &str) {
        self.leaves.remove(key);
        self.rebuild();
    }

    fn get_root_hash(&self) -> u32 {
        self.root.hash
    }

    fn bucket(&self, path: &str) -> Option<&MerkleNode> {
        let mut node = &self.root;
        for digit in path.chars() {
            node = node.children.get(&digit)?;
        }
        Some(node)
    }

    /// Immediate child bucket hashes under `path`, keyed by their single hex digit.
    fn bucket_hashes(&self, path: &str) -> HashMap<String, u32> {
        self.bucket(path)
            .map(|node| {
                node.children
                    .iter()
                    .map(|(digit, child)| (digit.to_string(), child.hash))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys whose routing path starts with `path`, sorted for determinism.
    fn keys_under(&self, path: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .leaves
            .keys()
            .filter(|k| Self::key_path(k, self.depth).starts_with(path))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn key_path(key: &str, depth: usize) -> String {
        format!("{:08x}", fnv1a_hash(key)).chars().take(depth).collect()
    }

    fn rebuild(&mut self) {
        self.root = Self::build_level(&self.leaves, self.depth, "");
    }

    fn build_level(leaves: &HashMap<String, u32>, total_depth: usize, prefix: &str) -> MerkleNode {
        if prefix.len() == total_depth {
            let mut matched: Vec<(&str, u32)> = leaves
                .iter()
                .filter(|(k, _)| Self::key_path(k, total_depth) == prefix)
                .map(|(k, h)| (k.as_str(), *h))
                .collect();
            matched.sort_by_key(|(k, _)| *k);
            let hashes: Vec<u32> = matched.into_iter().map(|(_, h)| h).collect();
            return MerkleNode { hash: combine_hashes(&hashes), children: BTreeMap::new() };
        }

        let mut digits_present: BTreeSet<char> = BTreeSet::new();
        for key in leaves.keys() {
            let path = Self::key_path(key, total_depth);
            if path.starts_with(prefix) {
                if let Some(digit) = path.chars().nth(prefix.len()) {
                    digits_present.insert(digit);
                }
            }
        }

        let mut children = BTreeMap::new();
        for digit in digits_present {
            let mut child_prefix = prefix.to_string();
            child_prefix.push(digit);
            children.insert(digit, Self::build_level(leaves, total_depth, &child_prefix));
        }

        let child_hashes: Vec<u32> = children.values().map(|n| n.hash).collect();
        MerkleNode { hash: combine_hashes(&child_hashes), children }
    }
}

/// Merkle tree for `LWWMap` delta synchronization.
///
/// Leaf hashes combine a key's value and timestamp (computed by the caller,
/// see [`crate::lww_map::LWWMap`]'s `update_merkle`), so any value or causal
/// change to a key changes the root.
pub struct MerkleTree(Trie);

impl MerkleTree {
    /// Creates an empty tree with the given routing-path depth.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self(Trie::new(depth))
    }

    /// Creates an empty tree with the default depth (3 hex digits = 4096 buckets).
    #[must_use]
    pub fn default_depth() -> Self {
        Self::new(3)
    }

    /// Inserts or updates a key's leaf hash and recomputes the root.
    pub fn update(&mut self, key: &str, item_hash: u32) {
        self.0.update(key, item_hash);
    }

    /// Removes a key's leaf and recomputes the root.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// The combined hash of the whole tree. `0` when empty.
    #[must_use]
    pub fn get_root_hash(&self) -> u32 {
        self.0.get_root_hash()
    }

    /// Immediate child bucket hashes under a routing path (hex digit string).
    #[must_use]
    pub fn bucket_hashes(&self, path: &str) -> HashMap<String, u32> {
        self.0.bucket_hashes(path)
    }

    /// Keys whose routing path falls under the given prefix.
    #[must_use]
    pub fn keys_under(&self, path: &str) -> Vec<String> {
        self.0.keys_under(path)
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::default_depth()
    }
}

/// Merkle tree for `ORMap` delta synchronization.
///
/// Leaf hashes combine all active records and tombstone markers for a key
/// (see [`crate::or_map::ORMap`]'s `hash_entry`), so add/remove of any tagged
/// value changes the root.
pub struct ORMapMerkleTree(Trie);

impl ORMapMerkleTree {
    /// Creates an empty tree with the given routing-path depth.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self(Trie::new(depth))
    }

    /// Creates an empty tree with the default depth (3 hex digits = 4096 buckets).
    #[must_use]
    pub fn default_depth() -> Self {
        Self::new(3)
    }

    /// Inserts or updates a key's entry hash and recomputes the root.
    pub fn update(&mut self, key: &str, entry_hash: u32) {
        self.0.update(key, entry_hash);
    }

    /// Removes a key's leaf and recomputes the root.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// The combined hash of the whole tree. `0` when empty.
    #[must_use]
    pub fn get_root_hash(&self) -> u32 {
        self.0.get_root_hash()
    }

    /// Immediate child bucket hashes under a routing path (hex digit string).
    #[must_use]
    pub fn bucket_hashes(&self, path: &str) -> HashMap<String, u32> {
        self.0.bucket_hashes(path)
    }

    /// Keys whose routing path falls under the given prefix.
    #[must_use]
    pub fn keys_under(&self, path: &str) -> Vec<String> {
        self.0.keys_under(path)
    }
}

impl Default for ORMapMerkleTree {
    fn default() -> Self {
        Self::default_depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_root_is_zero() {
        let tree = MerkleTree::default_depth();
        assert_eq!(tree.get_root_hash(), 0);
    }

    #[test]
    fn update_changes_root() {
        let mut tree = MerkleTree::default_depth();
        let before = tree.get_root_hash();
        tree.update("key1", 42);
        assert_ne!(tree.get_root_hash(), before);
    }

    #[test]
    fn remove_last_key_resets_root_to_zero() {
        let mut tree = MerkleTree::default_depth();
        tree.update("key1", 42);
        tree.remove("key1");
        assert_eq!(tree.get_root_hash(), 0);
    }

    #[test]
    fn same_operations_same_root() {
        let mut a = MerkleTree::default_depth();
        let mut b = MerkleTree::default_depth();
        for (k, h) in [("a", 1u32), ("b", 2), ("c", 3)] {
            a.update(k, h);
            b.update(k, h);
        }
        assert_eq!(a.get_root_hash(), b.get_root_hash());
    }

    #[test]
    fn insertion_order_does_not_affect_root() {
        let mut a = MerkleTree::default_depth();
        a.update("a", 1);
        a.update("b", 2);

        let mut b = MerkleTree::default_depth();
        b.update("b", 2);
        b.update("a", 1);

        assert_eq!(a.get_root_hash(), b.get_root_hash());
    }

    #[test]
    fn keys_under_root_returns_all_keys() {
        let mut tree = MerkleTree::default_depth();
        tree.update("alpha", 1);
        tree.update("beta", 2);
        let keys = tree.keys_under("");
        assert_eq!(keys, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn or_map_merkle_tree_independent_of_lww() {
        let mut tree = ORMapMerkleTree::default_depth();
        assert_eq!(tree.get_root_hash(), 0);
        tree.update("key1", 7);
        assert_ne!(tree.get_root_hash(), 0);
    }

    #[test]
    fn bucket_hashes_reflect_children() {
        let mut tree = MerkleTree::new(1);
        tree.update("alpha", 1);
        tree.update("beta", 2);
        let buckets = tree.bucket_hashes("");
        assert!(!buckets.is_empty());
        let sum_of_leaf_buckets: usize = buckets.len();
        assert!(sum_of_leaf_buckets <= 16);
    }
}
