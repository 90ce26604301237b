//! Thin internal cache used by the Service Orchestrator and Continuous
//! Query Manager for deployment/assignment bookkeeping.
//!
//! Reuses the Cache Store contract (a single `RecordStore`) with no storage
//! code of its own: `REPLICATED`, `FULL_SYNC`, `internal = true`. Typed keys
//! ([`DeploymentKey`], [`AssignmentKey`]) are serialized to strings so they
//! can be stored through the ordinary `RecordStore::put`/`get` surface.

use std::sync::Arc;

use topgun_core::hlc::Timestamp;
use topgun_core::types::Value;

use crate::storage::record::RecordValue;
use crate::storage::record_store::{CallerProvenance, ExpiryPolicy, RecordStore};

/// Key for a service deployment spec record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub name: String,
}

impl DeploymentKey {
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("deployments/{}", self.name)
    }
}

/// Key for a service assignment record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignmentKey {
    pub name: String,
}

impl AssignmentKey {
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("assignments/{}", self.name)
    }
}

/// Internal replicated cache backing deployment/assignment records.
///
/// Entries are never exposed to user continuous queries; `internal` callers
/// (the orchestrator, the query manager's own route registration) are the
/// only expected clients, per spec.
pub struct SystemCache {
    store: Arc<dyn RecordStore>,
    node_id: String,
}

impl SystemCache {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, node_id: String) -> Self {
        Self { store, node_id }
    }

    fn wrap(&self, bytes: Vec<u8>) -> RecordValue {
        RecordValue::Lww {
            value: Value::Bytes(bytes),
            timestamp: Timestamp { millis: 0, counter: 0, node_id: self.node_id.clone() },
        }
    }

    /// Persists a deployment spec under `deployments/{name}`. `FULL_SYNC`
    /// durability is the write path's concern, not this wrapper's; callers
    /// construct the `RecordStore` they pass in with that in mind.
    pub async fn put_deployment(&self, key: &DeploymentKey, spec_bytes: Vec<u8>) -> anyhow::Result<()> {
        self.store
            .put(&key.storage_key(), self.wrap(spec_bytes), ExpiryPolicy::NONE, CallerProvenance::Client)
            .await?;
        Ok(())
    }

    pub async fn get_deployment(&self, key: &DeploymentKey) -> anyhow::Result<Option<Vec<u8>>> {
        self.get_bytes(&key.storage_key()).await
    }

    pub async fn remove_deployment(&self, key: &DeploymentKey) -> anyhow::Result<()> {
        self.store.remove(&key.storage_key(), CallerProvenance::Client).await?;
        Ok(())
    }

    /// Persists an assignment record under `assignments/{name}`.
    pub async fn put_assignment(&self, key: &AssignmentKey, assignment_bytes: Vec<u8>) -> anyhow::Result<()> {
        self.store
            .put(
                &key.storage_key(),
                self.wrap(assignment_bytes),
                ExpiryPolicy::NONE,
                CallerProvenance::Client,
            )
            .await?;
        Ok(())
    }

    pub async fn get_assignment(&self, key: &AssignmentKey) -> anyhow::Result<Option<Vec<u8>>> {
        self.get_bytes(&key.storage_key()).await
    }

    pub async fn remove_assignment(&self, key: &AssignmentKey) -> anyhow::Result<()> {
        self.store.remove(&key.storage_key(), CallerProvenance::Client).await?;
        Ok(())
    }

    async fn get_bytes(&self, storage_key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let record = self.store.get(storage_key, false).await?;
        Ok(record.and_then(|r| match r.value {
            RecordValue::Lww { value: Value::Bytes(b), .. } => Some(b),
            _ => None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use super::*;
    use crate::storage::datastores::NullDataStore;
    use crate::storage::engines::HashMapStorage;
    use crate::storage::impls::{DefaultRecordStore, StorageConfig};
    use crate::storage::mutation_observer::CompositeMutationObserver;

    fn cache() -> SystemCache {
        let store: Arc<dyn RecordStore> = StdArc::new(DefaultRecordStore::new(
            "__system".to_string(),
            0,
            Box::new(HashMapStorage::new()),
            StdArc::new(NullDataStore),
            StdArc::new(CompositeMutationObserver::default()),
            StorageConfig::default(),
        ));
        SystemCache::new(store, "node-1".to_string())
    }

    #[tokio::test]
    async fn deployment_round_trips() {
        let cache = cache();
        let key = DeploymentKey { name: "search".to_string() };
        cache.put_deployment(&key, vec![1, 2, 3]).await.unwrap();
        assert_eq!(cache.get_deployment(&key).await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn assignment_round_trips_and_removes() {
        let cache = cache();
        let key = AssignmentKey { name: "search".to_string() };
        cache.put_assignment(&key, vec![9, 9]).await.unwrap();
        assert_eq!(cache.get_assignment(&key).await.unwrap(), Some(vec![9, 9]));

        cache.remove_assignment(&key).await.unwrap();
        assert_eq!(cache.get_assignment(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let cache = cache();
        let key = DeploymentKey { name: "missing".to_string() };
        assert_eq!(cache.get_deployment(&key).await.unwrap(), None);
    }
}
