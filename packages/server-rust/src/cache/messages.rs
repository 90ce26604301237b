//! Cache-subsystem wire messages: the write/backup/rebalance/service-control
//! payloads exchanged between nodes, in the same internally-tagged MsgPack
//! shape as [`crate::cluster::messages::ClusterMessage`].
//!
//! Only [`OpForwardPayload`] (see `cluster::messages`) sits on a live send
//! path today -- backup replication and rebalance batches are applied
//! through direct `RecordStore` handles rather than a socket (no production
//! transport ships in this crate), and service deployment propagates through
//! the System Cache rather than a point-to-point message. The types here
//! document the wire shape those paths would use once a real
//! `ClusterTransport` implementation exists, and round-trip under
//! `rmp_serde` the same way the already-wired messages do.

use serde::{Deserialize, Serialize};

/// Status of a write/backup acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Ok,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheWriteReqPayload {
    pub cache_id: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<rmpv::Value>,
    pub flags: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tx_id: Option<String>,
    pub topology_version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheWriteAckPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tx_id: Option<String>,
    pub topology_version: u64,
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prev_value: Option<rmpv::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReqPayload {
    pub cache_id: String,
    pub partition_id: u32,
    pub entry: rmpv::Value,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupAckPayload {
    pub cache_id: String,
    pub partition_id: u32,
    pub status: AckStatus,
}

/// A single migrated entry, as transferred by a rebalance batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceEntry {
    pub key: String,
    pub value: rmpv::Value,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expire_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceBatchPayload {
    pub cache_id: String,
    pub partition_id: u32,
    pub entries: Vec<RebalanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceBatchAckPayload {
    pub cache_id: String,
    pub partition_id: u32,
    pub status: AckStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeployPayload {
    pub spec: Vec<u8>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAssignPayload {
    pub name: String,
    pub topology_version: u64,
    pub counts: std::collections::BTreeMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_write_req_round_trips() {
        let payload = CacheWriteReqPayload {
            cache_id: "orders".to_string(),
            key: "order-1".to_string(),
            value: Some(rmpv::Value::Integer(7.into())),
            flags: 0,
            tx_id: Some("tx-1".to_string()),
            topology_version: 3,
        };
        let bytes = rmp_serde::to_vec_named(&payload).unwrap();
        let decoded: CacheWriteReqPayload = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn backup_req_round_trips() {
        let payload = BackupReqPayload {
            cache_id: "orders".to_string(),
            partition_id: 5,
            entry: rmpv::Value::String("value".into()),
            version: 9,
        };
        let bytes = rmp_serde::to_vec_named(&payload).unwrap();
        let decoded: BackupReqPayload = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn rebalance_batch_round_trips_with_multiple_entries() {
        let payload = RebalanceBatchPayload {
            cache_id: "orders".to_string(),
            partition_id: 2,
            entries: vec![
                RebalanceEntry {
                    key: "k1".to_string(),
                    value: rmpv::Value::Integer(1.into()),
                    version: 1,
                    expire_at: None,
                },
                RebalanceEntry {
                    key: "k2".to_string(),
                    value: rmpv::Value::Integer(2.into()),
                    version: 2,
                    expire_at: Some(1_700_000_000),
                },
            ],
        };
        let bytes = rmp_serde::to_vec_named(&payload).unwrap();
        let decoded: RebalanceBatchPayload = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn service_assign_round_trips() {
        let mut counts = std::collections::BTreeMap::new();
        counts.insert("node-1".to_string(), 2u32);
        counts.insert("node-2".to_string(), 1u32);
        let payload = ServiceAssignPayload { name: "svc".to_string(), topology_version: 4, counts };
        let bytes = rmp_serde::to_vec_named(&payload).unwrap();
        let decoded: ServiceAssignPayload = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }
}
