//! Per-node partition replica lifecycle and rebalance batching.
//!
//! `PartitionFsm` tracks the local node's [`PartitionLifecycle`] for every
//! partition it holds a stake in, validating transitions. `batch_entries`
//! chunks a `RecordStore`'s contents into fixed-size batches sized by
//! `rebalance_batch_size`, layered on top of the existing
//! `MigrateStart`/`MigrateData`/`MigrateReady`/`MigrateFinalize`/`MigrateCancel`
//! wire messages -- no new wire messages are introduced, only the chunking and
//! local-state bookkeeping around sending them.

use dashmap::DashMap;
use thiserror::Error;

use crate::storage::record::{Record, RecordValue};
use crate::storage::record_store::RecordStore;
use crate::storage::engine::IterationCursor;

use super::types::PartitionLifecycle;

/// Error raised by an illegal [`PartitionLifecycle`] transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal partition lifecycle transition for partition {partition_id}: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub partition_id: u32,
    pub from: PartitionLifecycle,
    pub to: PartitionLifecycle,
}

/// Tracks the local replica lifecycle for every partition this node has a
/// stake in. A partition with no entry is simply not held locally.
#[derive(Default)]
pub struct PartitionFsm {
    states: DashMap<u32, PartitionLifecycle>,
}

impl PartitionFsm {
    #[must_use]
    pub fn new() -> Self {
        Self { states: DashMap::new() }
    }

    /// Returns the current lifecycle state for a partition, if tracked.
    pub fn get(&self, partition_id: u32) -> Option<PartitionLifecycle> {
        self.states.get(&partition_id).map(|r| *r)
    }

    /// Marks a partition as locally owned outright (no migration in progress).
    /// Used to seed state for partitions assigned at startup or after a
    /// completed migration has already been finalized elsewhere.
    pub fn set_owning(&self, partition_id: u32) {
        self.states.insert(partition_id, PartitionLifecycle::Owning);
    }

    /// Attempts a transition, validating it against the allowed edges:
    ///
    /// - `Owning -> Moving` (outbound migration begins)
    /// - `Moving -> Evicted` (outbound migration's source finalizes)
    /// - `Moving -> Owning` (outbound migration cancelled)
    /// - (no entry) -> `Renting` (inbound migration begins)
    /// - `Renting -> Owning` (inbound migration finalizes)
    /// - `Renting -> Evicted` (inbound migration cancelled)
    /// - `Evicted -> Renting` (a partition can be re-rented after eviction)
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the requested edge is not in this set.
    pub fn transition(
        &self,
        partition_id: u32,
        to: PartitionLifecycle,
    ) -> Result<(), IllegalTransition> {
        use PartitionLifecycle::{Evicted, Moving, Owning, Renting};

        let from = self.get(partition_id);
        let legal = matches!(
            (from, to),
            (Some(Owning), Moving)
                | (Some(Moving), Evicted)
                | (Some(Moving), Owning)
                | (None, Renting)
                | (Some(Renting), Owning)
                | (Some(Renting), Evicted)
                | (Some(Evicted), Renting)
        );

        if !legal {
            return Err(IllegalTransition {
                partition_id,
                from: from.unwrap_or(PartitionLifecycle::Evicted),
                to,
            });
        }

        self.states.insert(partition_id, to);
        Ok(())
    }

    /// Removes all tracking for a partition (used once eviction is fully
    /// reconciled and the slot is no longer of local interest).
    pub fn forget(&self, partition_id: u32) {
        self.states.remove(&partition_id);
    }
}

/// One chunk of a rebalance transfer: a bounded slice of a partition's
/// entries, destined to be carried inside a `MigrateDataPayload.delta_ops`
/// (or a fresh `MapStateChunk` for the first batch of a map).
#[derive(Debug, Clone)]
pub struct RebalanceBatch {
    pub partition_id: u32,
    pub map_name: String,
    pub entries: Vec<(String, Record)>,
    pub is_last: bool,
}

/// Splits a `RecordStore`'s current contents into `RebalanceBatch`es of at
/// most `batch_size` entries each, using the store's own cursor-based
/// iteration so a slow migration doesn't hold a long-lived snapshot lock.
pub fn batch_entries(store: &dyn RecordStore, batch_size: usize) -> Vec<RebalanceBatch> {
    let mut batches = Vec::new();
    let mut cursor = IterationCursor::start();

    loop {
        let result = store.fetch_entries(&cursor, batch_size);
        let is_last = result.next_cursor.finished;
        if !result.items.is_empty() || is_last {
            batches.push(RebalanceBatch {
                partition_id: store.partition_id(),
                map_name: store.name().to_string(),
                entries: result.items,
                is_last,
            });
        }
        cursor = result.next_cursor;
        if is_last {
            break;
        }
    }

    if batches.is_empty() {
        batches.push(RebalanceBatch {
            partition_id: store.partition_id(),
            map_name: store.name().to_string(),
            entries: Vec::new(),
            is_last: true,
        });
    }

    batches
}

#[allow(dead_code)]
fn ensure_record_value_is_clonable(v: &RecordValue) -> RecordValue {
    v.clone()
}
