use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lww_map::LWWMap;
use crate::or_map::ORMap;

/// Opaque serialized CRDT record stored in persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageValue {
    /// Raw bytes of the serialized CRDT record.
    pub data: Vec<u8>,
}

/// Generic runtime value type for CRDT map entries.
///
/// Mirrors the dynamic value shapes accepted by the TypeScript client
/// (`null | boolean | number | string | Uint8Array | array | object`).
/// `Map` uses a `BTreeMap` so key order is stable across nodes, which matters
/// for the canonical-JSON hashing used by [`crate::or_map::ORMap`]'s Merkle
/// integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value, distinct from a missing key.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Key-ordered map of values.
    Map(BTreeMap<String, Value>),
}

/// Discriminant for CRDT map types (LWW vs OR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapType {
    /// Last-Write-Wins Map: conflict resolution by highest timestamp.
    Lww,
    /// Observed-Remove Map: supports concurrent additions with unique tags.
    Or,
}

/// Unified CRDT map abstraction, dispatching to the concrete `LWWMap` or
/// `ORMap` implementation selected at map-creation time.
#[derive(Debug)]
pub enum CrdtMap {
    Lww(LWWMap<Value>),
    Or(ORMap<Value>),
}

impl CrdtMap {
    /// Which CRDT strategy this map uses.
    #[must_use]
    pub fn map_type(&self) -> MapType {
        match self {
            CrdtMap::Lww(_) => MapType::Lww,
            CrdtMap::Or(_) => MapType::Or,
        }
    }
}

/// Authentication principal for multi-tenancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Roles assigned to this principal for authorization checks.
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::{SystemClock, HLC};

    #[test]
    fn crdt_map_reports_its_own_strategy() {
        let lww = CrdtMap::Lww(LWWMap::new(HLC::new("n1".to_string(), Box::new(SystemClock))));
        assert_eq!(lww.map_type(), MapType::Lww);

        let or = CrdtMap::Or(ORMap::new(HLC::new("n1".to_string(), Box::new(SystemClock))));
        assert_eq!(or.map_type(), MapType::Or);
    }
}
