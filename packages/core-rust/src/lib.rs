//! `TopGun` Core -- CRDTs, Hybrid Logical Clock, `MerkleTree`, and message schemas.
//!
//! This crate provides the foundation layer for the `TopGun` data grid:
//!
//! - **HLC** ([`hlc`]): Hybrid Logical Clock for distributed causality tracking
//! - **Hash** ([`hash`]): FNV-1a hash utilities for `MerkleTree` bucket routing
//! - **`MerkleTree`** ([`merkle`]): Prefix trie for efficient delta synchronization
//! - **Types** ([`types`]): `Value` enum, `StorageValue`, `MapType`, `CrdtMap`, `Principal`
//! - **Traits** ([`traits`]): `Processor`, `QueryNotifier` for DAG execution and live queries
//! - **Schema** ([`schema`]): `MapSchema`, `SyncShape`, `Predicate` for validation and shapes
//! - **Context** ([`context`]): `RequestContext` for per-request identity and tracing
//! - **Messages** ([`messages`]): Wire message catalog and the top-level [`messages::Message`] enum
//! - **Partition** ([`partition`]): FNV-1a key hashing and partition ownership lookups
//! - **Affinity** ([`affinity`]): Consistent-hash ring placement on top of `partition`
//! - **`LWWMap`** ([`lww_map`]): Last-Write-Wins CRDT map
//! - **`ORMap`** ([`or_map`]): Observed-Remove CRDT map

pub mod affinity;
pub mod context;
pub mod hash;
pub mod hlc;
pub mod lww_map;
pub mod merkle;
pub mod messages;
pub mod or_map;
pub mod partition;
pub mod schema;
pub mod traits;
pub mod types;

// Context
pub use context::RequestContext;

// Schema
pub use schema::{FieldDef, MapSchema, Predicate, SyncShape, ValidationResult};

// Traits
pub use traits::{Inbox, Processor, ProcessorContext, QueryNotifier};

// Types
pub use types::{CrdtMap, MapType, Principal, StorageValue, Value};

// HLC
pub use hlc::{ClockSource, SystemClock, Timestamp, HLC, LWWRecord, MergeKeyResult, ORMapRecord};

// Hash
pub use hash::{combine_hashes, fnv1a_hash};

// Merkle
pub use merkle::{MerkleNode, MerkleTree, ORMapMerkleTree};

// Messages
pub use messages::Message;

// Partition
pub use partition::{get_relevant_partitions, hash_to_partition, PartitionLookup, PartitionTable, PARTITION_COUNT};

// Affinity
pub use affinity::{nodes_for, partition_of};

// CRDT maps
pub use lww_map::LWWMap;
pub use or_map::ORMap;
