//! Write coordination across a partition's primary and its backups.
//!
//! `WritePath::write` decides, per call, whether the local node is primary
//! for the key (forwarding via [`OpForwardPayload`] if not), then applies
//! the write under the configured [`AtomicityMode`] and acknowledges the
//! caller according to [`WriteSync`].

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use topgun_core::affinity::{nodes_for, partition_of};

use crate::cluster::messages::OpForwardPayload;
use crate::cluster::transport::{ClusterTransport, NodeId, TopicId};
use crate::storage::record::RecordValue;
use crate::storage::record_store::{CallerProvenance, ExpiryPolicy, PeekMode, RecordStore};

use super::CacheError;

/// How many backups must persist a write before the primary acknowledges it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteSync {
    /// Acknowledge only after every live backup has persisted the write.
    FullSync,
    /// Acknowledge after the local apply; backups proceed asynchronously.
    PrimarySync,
    /// Acknowledge immediately; backups proceed asynchronously.
    FullAsync,
}

/// Isolation model for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomicityMode {
    /// Per-key last-writer-wins using [`EntryVersion`]; no multi-key isolation.
    Atomic,
    /// Acquires a per-key lock for the duration of the write.
    Transactional,
}

/// Totally-ordered tuple used as the LWW tiebreaker for `ATOMIC` caches:
/// `(topologyVersion, order, nodeOrder)`, mirroring
/// `topgun_core::hlc::Timestamp`'s `(millis, counter, node_id)` shape but
/// scoped to topology version instead of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryVersion {
    pub topology_version: u64,
    pub order: u64,
    pub node_order: u32,
}

/// Result of routing a write through [`WritePath::write`].
#[derive(Debug)]
pub enum WriteOutcome {
    /// Applied locally (this node was primary); carries the prior value.
    Applied(Option<RecordValue>),
    /// Not primary for this key; the write was forwarded instead of applied.
    Forwarded { primary: String },
}

/// Coordinates a write across a partition's primary replica and its
/// in-process backup handles, honoring `write_sync`/`atomicity`.
///
/// Backups are held as direct `RecordStore` handles rather than remote
/// connections: in a single-process deployment (or a test harness wiring
/// several `RecordStore`s together) this is exactly how a backup apply
/// happens once the bytes have already arrived over `ClusterTransport`;
/// the transport is used here only for the primary-forwarding hop.
pub struct WritePath {
    local_node_id: String,
    local_store: Arc<dyn RecordStore>,
    backup_stores: Vec<Arc<dyn RecordStore>>,
    transport: Arc<dyn ClusterTransport>,
    write_sync: WriteSync,
    atomicity: AtomicityMode,
    /// Last-applied version per key, consulted under `ATOMIC` to resolve
    /// concurrent writers by version comparison instead of apply order.
    /// `TRANSACTIONAL` writes serialize through `RecordStore::lock` instead
    /// and never consult this table.
    versions: DashMap<String, EntryVersion>,
}

impl WritePath {
    #[must_use]
    pub fn new(
        local_node_id: String,
        local_store: Arc<dyn RecordStore>,
        backup_stores: Vec<Arc<dyn RecordStore>>,
        transport: Arc<dyn ClusterTransport>,
        write_sync: WriteSync,
        atomicity: AtomicityMode,
    ) -> Self {
        Self {
            local_node_id,
            local_store,
            backup_stores,
            transport,
            write_sync,
            atomicity,
            versions: DashMap::new(),
        }
    }

    fn primary_for(key: &str, topology_version: u64, live_nodes: &[String]) -> Option<String> {
        nodes_for(partition_of(key), topology_version, live_nodes, 1)
            .into_iter()
            .next()
    }

    /// Applies `value` at `key`, forwarding to the partition's primary if
    /// the local node does not own it at `topology_version`. `version` is
    /// the write's `EntryVersion`; under `ATOMIC` a write whose version does
    /// not strictly dominate the key's last-applied version is dropped
    /// silently (the caller still gets `Applied` back with the unchanged
    /// prior value, since the write did lose the race rather than error).
    pub async fn write(
        &self,
        key: &str,
        value: RecordValue,
        client_id: Option<String>,
        topology_version: u64,
        live_nodes: &[String],
        version: EntryVersion,
    ) -> Result<WriteOutcome, CacheError> {
        let Some(primary) = Self::primary_for(key, topology_version, live_nodes) else {
            return Err(CacheError::TopologyChanged);
        };

        if primary != self.local_node_id {
            let payload = OpForwardPayload {
                source_node_id: self.local_node_id.clone(),
                target_partition_id: partition_of(key),
                client_id,
                payload: rmp_serde::to_vec_named(&value)
                    .map_err(|e| CacheError::ConfigurationError(e.to_string()))?,
            };
            let bytes = Bytes::from(
                rmp_serde::to_vec_named(&payload)
                    .map_err(|e| CacheError::ConfigurationError(e.to_string()))?,
            );
            self.transport
                .send_ordered(&TopicId::new("op-forward"), &NodeId::new(primary.clone()), bytes)
                .await?;
            return Ok(WriteOutcome::Forwarded { primary });
        }

        if matches!(self.atomicity, AtomicityMode::Atomic) {
            let loses_race = self
                .versions
                .get(key)
                .is_some_and(|current| *current >= version);
            if loses_race {
                let existing = self
                    .local_store
                    .peek(key, PeekMode::MemoryOnly)
                    .await
                    .map_err(|e| CacheError::ConfigurationError(e.to_string()))?
                    .map(|r| r.value);
                return Ok(WriteOutcome::Applied(existing));
            }
        }

        let lock_owner = client_id.as_deref().unwrap_or("write-path");
        let locked = matches!(self.atomicity, AtomicityMode::Transactional)
            && self.local_store.lock(key, lock_owner, 5000);

        if matches!(self.atomicity, AtomicityMode::Transactional) && !locked {
            return Err(CacheError::LockTimeout(key.to_string()));
        }

        let result = self
            .local_store
            .put(key, value.clone(), ExpiryPolicy::NONE, CallerProvenance::Client)
            .await;

        if locked {
            self.local_store.unlock(key, lock_owner);
        }

        let old = result.map_err(|e| CacheError::ConfigurationError(e.to_string()))?;

        if matches!(self.atomicity, AtomicityMode::Atomic) {
            self.versions.insert(key.to_string(), version);
        }

        match self.write_sync {
            WriteSync::FullAsync => {}
            WriteSync::PrimarySync => {
                for backup in &self.backup_stores {
                    let record = value.clone();
                    let backup = backup.clone();
                    let key = key.to_string();
                    tokio::spawn(async move {
                        let _ = backup
                            .put(&key, record, ExpiryPolicy::NONE, CallerProvenance::Backup)
                            .await;
                    });
                }
            }
            WriteSync::FullSync => {
                for backup in &self.backup_stores {
                    backup
                        .put(key, value.clone(), ExpiryPolicy::NONE, CallerProvenance::Backup)
                        .await
                        .map_err(|e| CacheError::ConfigurationError(e.to_string()))?;
                }
            }
        }

        Ok(WriteOutcome::Applied(old))
    }
}
