//! Service Orchestrator: keeps each node's live service instances matching
//! the current assignment map.
//!
//! Assignment runs entirely in-process (callers are expected to invoke
//! `recompute` only on the oldest node of a topology version, same
//! discipline `cluster::assignment::compute_assignment` expects of its
//! caller) and persists through [`SystemCache`]; redeployment reacts to
//! `deployments/{name}` / `assignments/{name}` changes the same way
//! `cluster::assignment::plan_rebalance` diffs partition tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use quick_cache::sync::Cache as QuickCache;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use topgun_core::affinity::{nodes_for, partition_of};

use crate::cache::{AssignmentKey, CacheError, DeploymentKey, SystemCache};
use crate::service::registry::{ManagedService, ServiceContext};

/// Produces a fresh instance of a deployed service's [`ManagedService`] body.
/// Registered per service name via [`ServiceOrchestrator::register_factory`];
/// peer class loading (loading `service_bytes` from a node that hasn't seen
/// this deployment before) is out of scope, so every node that can host a
/// deployment must register its factory up front.
pub type ServiceFactory = Arc<dyn Fn() -> Arc<dyn ManagedService> + Send + Sync>;

/// On-disk shape of a [`ServiceSpec`], persisted under `deployments/{name}`.
#[derive(Debug, Serialize, Deserialize)]
struct ServiceSpecRecord {
    name: String,
    service_bytes: Vec<u8>,
    node_filter: Option<String>,
    total_count: u32,
    per_node_count: u32,
    cache_name: Option<String>,
    affinity_key: Option<String>,
}

/// On-disk shape of a [`ServiceAssignment`], persisted under `assignments/{name}`.
#[derive(Debug, Serialize, Deserialize)]
struct ServiceAssignmentRecord {
    name: String,
    topology_version: u64,
    counts: BTreeMap<String, u32>,
}

/// A deployable service spec, matching the shape persisted under
/// `deployments/{name}` in the System Cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub service_bytes: Vec<u8>,
    pub node_filter: Option<String>,
    pub total_count: u32,
    pub per_node_count: u32,
    pub cache_name: Option<String>,
    pub affinity_key: Option<String>,
}

impl ServiceSpec {
    fn validate(&self) -> Result<(), CacheError> {
        if self.total_count == 0 && self.per_node_count == 0 {
            return Err(CacheError::DeploymentFailure(format!(
                "service {:?} needs TotalCount>0 or PerNodeCount>0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-node instance counts for a deployed service at a given topology
/// version, matching `assignments/{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAssignment {
    pub name: String,
    pub topology_version: u64,
    pub counts: BTreeMap<String, u32>,
}

/// Computes the target assignment for `spec` against `live_nodes` at
/// `topology_version`, per the five-step algorithm: affinity pin, candidate
/// filtering, base count, remainder distribution (preferring nodes already
/// at the base count), persisted by the caller.
#[must_use]
pub fn compute_service_assignment(
    spec: &ServiceSpec,
    live_nodes: &[String],
    topology_version: u64,
    previous: Option<&ServiceAssignment>,
) -> ServiceAssignment {
    let mut counts = BTreeMap::new();

    if let Some(affinity_key) = &spec.affinity_key {
        let owner = nodes_for(partition_of(affinity_key), topology_version, live_nodes, 1)
            .into_iter()
            .next();
        if let Some(owner) = owner {
            let count = spec.per_node_count.max(spec.total_count).max(1);
            counts.insert(owner, count);
        }
        return ServiceAssignment { name: spec.name.clone(), topology_version, counts };
    }

    let candidates: Vec<&String> = live_nodes
        .iter()
        .filter(|n| {
            spec.node_filter
                .as_deref()
                .map_or(true, |f| n.as_str() == f || f == "*")
        })
        .collect();

    if candidates.is_empty() {
        return ServiceAssignment { name: spec.name.clone(), topology_version, counts };
    }

    let n = candidates.len() as u32;
    let base = if spec.total_count > 0 {
        let b = spec.total_count / n;
        if spec.per_node_count > 0 { b.min(spec.per_node_count) } else { b }
    } else {
        spec.per_node_count
    };

    for node in &candidates {
        counts.insert((*node).clone(), base);
    }

    if spec.total_count > 0 {
        let remainder = spec.total_count % n;
        let mut ordered: Vec<&String> = candidates.clone();
        // Nodes already hosting the service at the base count get first claim
        // on the remainder, to minimize instance churn across reassignment.
        ordered.sort_by_key(|node| {
            let already_at_base = previous
                .and_then(|p| p.counts.get(node.as_str()))
                .is_some_and(|c| *c == base);
            !already_at_base
        });
        let mut rest = ordered.split_off(
            ordered
                .iter()
                .position(|node| {
                    !previous
                        .and_then(|p| p.counts.get(node.as_str()))
                        .is_some_and(|c| *c == base)
                })
                .unwrap_or(ordered.len()),
        );
        rest.shuffle(&mut rand::rng());
        ordered.extend(rest);

        for node in ordered.into_iter().take(remainder as usize) {
            *counts.entry(node.clone()).or_insert(0) += 1;
        }
    }

    ServiceAssignment { name: spec.name.clone(), topology_version, counts }
}

/// A single locally-running instance of a deployed service, backed by the
/// same lifecycle trait `ServiceRegistry` uses for the fixed domain services.
struct RunningInstance {
    service: Arc<dyn ManagedService>,
}

/// Tracks deployed specs, their current assignment, and this node's running
/// instance count per service name.
pub struct ServiceOrchestrator {
    local_node_id: String,
    system_cache: Arc<SystemCache>,
    ctx: ServiceContext,
    specs: DashMap<String, ServiceSpec>,
    assignments: DashMap<String, ServiceAssignment>,
    instances: DashMap<String, Vec<RunningInstance>>,
    factories: DashMap<String, ServiceFactory>,
    /// Per-caller sticky routing, keyed by `(caller_id, service_name)`. Only
    /// pins a caller to a node already confirmed live for that service;
    /// entries for a node that's since dropped out are overwritten rather
    /// than evicted eagerly.
    sticky_routes: QuickCache<(String, String), String>,
}

impl ServiceOrchestrator {
    #[must_use]
    pub fn new(local_node_id: String, system_cache: Arc<SystemCache>, ctx: ServiceContext) -> Self {
        Self {
            local_node_id,
            system_cache,
            ctx,
            specs: DashMap::new(),
            assignments: DashMap::new(),
            instances: DashMap::new(),
            factories: DashMap::new(),
            sticky_routes: QuickCache::new(1024),
        }
    }

    /// Registers the factory used to instantiate `name`'s running instances
    /// on this node. `ServiceRegistry` can't be reused directly here: its
    /// `by_name` table is keyed by `&'static str`, one slot per compiled-in
    /// domain service, while deployments are named dynamically at runtime and
    /// can come and go over the cluster's lifetime.
    pub fn register_factory(
        &self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<dyn ManagedService> + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Idempotent per name: an identical spec already present is a no-op; a
    /// differing spec under the same name fails.
    pub async fn deploy(&self, spec: ServiceSpec) -> Result<(), CacheError> {
        spec.validate()?;

        if let Some(existing) = self.specs.get(&spec.name) {
            if *existing == spec {
                return Ok(());
            }
            return Err(CacheError::DeploymentFailure(format!(
                "service {:?} already deployed with a different spec",
                spec.name
            )));
        }

        let bytes = encode_spec(&spec);
        self.system_cache
            .put_deployment(&DeploymentKey { name: spec.name.clone() }, bytes)
            .await
            .map_err(|e| CacheError::DeploymentFailure(e.to_string()))?;
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub async fn deploy_node_singleton(
        &self,
        group: impl Into<String>,
        name: impl Into<String>,
        service_bytes: Vec<u8>,
    ) -> Result<(), CacheError> {
        self.deploy(ServiceSpec {
            name: name.into(),
            service_bytes,
            node_filter: Some(group.into()),
            total_count: 0,
            per_node_count: 1,
            cache_name: None,
            affinity_key: None,
        })
        .await
    }

    pub async fn deploy_cluster_singleton(
        &self,
        group: impl Into<String>,
        name: impl Into<String>,
        service_bytes: Vec<u8>,
    ) -> Result<(), CacheError> {
        self.deploy(ServiceSpec {
            name: name.into(),
            service_bytes,
            node_filter: Some(group.into()),
            total_count: 1,
            per_node_count: 1,
            cache_name: None,
            affinity_key: None,
        })
        .await
    }

    pub async fn deploy_key_affinity_singleton(
        &self,
        name: impl Into<String>,
        service_bytes: Vec<u8>,
        cache_name: impl Into<String>,
        affinity_key: impl Into<String>,
    ) -> Result<(), CacheError> {
        self.deploy(ServiceSpec {
            name: name.into(),
            service_bytes,
            node_filter: None,
            total_count: 1,
            per_node_count: 1,
            cache_name: Some(cache_name.into()),
            affinity_key: Some(affinity_key.into()),
        })
        .await
    }

    /// Removes the deployment and its persisted assignment; local instances
    /// are cancelled by the next `reconcile` call on every node once the
    /// assignment delete propagates through the Continuous Query Manager.
    pub async fn cancel(&self, name: &str) -> Result<(), CacheError> {
        self.specs.remove(name);
        self.assignments.remove(name);
        self.system_cache
            .remove_deployment(&DeploymentKey { name: name.to_string() })
            .await
            .map_err(|e| CacheError::DeploymentFailure(e.to_string()))?;
        self.system_cache
            .remove_assignment(&AssignmentKey { name: name.to_string() })
            .await
            .map_err(|e| CacheError::DeploymentFailure(e.to_string()))?;
        self.shutdown_local(name).await;
        Ok(())
    }

    pub async fn cancel_all(&self) -> Result<(), CacheError> {
        let names: Vec<String> = self.specs.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.cancel(&name).await?;
        }
        Ok(())
    }

    /// Recomputes and persists the assignment for `name` against
    /// `live_nodes` at `topology_version`. Intended to run only on the
    /// oldest node of the topology version, per the orchestration contract.
    pub async fn recompute(
        &self,
        name: &str,
        live_nodes: &[String],
        topology_version: u64,
    ) -> Result<ServiceAssignment, CacheError> {
        let Some(spec) = self.specs.get(name).map(|e| e.value().clone()) else {
            return Err(CacheError::DeploymentFailure(format!("no deployment named {name:?}")));
        };
        let previous = self.assignments.get(name).map(|e| e.value().clone());
        let target = compute_service_assignment(&spec, live_nodes, topology_version, previous.as_ref());

        let bytes = encode_assignment(&target);
        self.system_cache
            .put_assignment(&AssignmentKey { name: name.to_string() }, bytes)
            .await
            .map_err(|e| CacheError::DeploymentFailure(e.to_string()))?;
        self.assignments.insert(name.to_string(), target.clone());
        Ok(target)
    }

    /// Reconciles this node's running instance count for `name` against its
    /// persisted target, spawning or cancelling instances as needed. New
    /// instances come from the factory registered via `register_factory` and
    /// are initialized the same way `ServiceRegistry::init_all` initializes
    /// the fixed domain services; a name with no registered factory can be
    /// assigned to this node (its spec exists) but never actually hosted
    /// here, which is as far as the orchestrator's own scope reaches.
    pub fn reconcile_local(&self, name: &str) {
        let Some(assignment) = self.assignments.get(name) else {
            return;
        };
        let target = assignment.counts.get(&self.local_node_id).copied().unwrap_or(0) as usize;
        drop(assignment);

        let mut running = self.instances.entry(name.to_string()).or_default();
        while running.len() < target {
            let Some(factory) = self.factories.get(name).map(|f| f.clone()) else {
                break;
            };
            let service = factory();
            let ctx = self.ctx.clone();
            let init_target = service.clone();
            tokio::spawn(async move {
                let _ = init_target.init(&ctx).await;
            });
            running.push(RunningInstance { service });
        }
        while running.len() > target {
            if let Some(instance) = running.pop() {
                tokio::spawn(async move {
                    let _ = instance.service.shutdown(false).await;
                });
            }
        }
    }

    async fn shutdown_local(&self, name: &str) {
        if let Some((_, running)) = self.instances.remove(name) {
            for instance in running {
                let _ = instance.service.shutdown(true).await;
            }
        }
    }

    pub fn local_instance_count(&self, name: &str) -> usize {
        self.instances.get(name).map_or(0, |r| r.len())
    }

    /// Returns the node this proxy should route to for `name` within
    /// `group`, preferring a local instance, then a node already pinned for
    /// `caller_id` (if it's still hosting an instance), then the first live
    /// match. A non-local pick is cached in `sticky_routes` so the same
    /// caller keeps landing on the same remote node across calls instead of
    /// bouncing between instances on every redeploy-triggered reassignment.
    pub fn service_proxy_target(&self, caller_id: &str, group: Option<&str>, name: &str) -> Option<String> {
        let assignment = self.assignments.get(name)?;
        if assignment.counts.get(&self.local_node_id).copied().unwrap_or(0) > 0 {
            return Some(self.local_node_id.clone());
        }

        let sticky_key = (caller_id.to_string(), name.to_string());
        if let Some(pinned) = self.sticky_routes.get(&sticky_key) {
            if assignment.counts.get(&pinned).copied().unwrap_or(0) > 0 {
                return Some(pinned);
            }
        }

        let picked = assignment
            .counts
            .iter()
            .filter(|(node, count)| {
                **count > 0 && group.map_or(true, |g| node.as_str() == g || g == "*")
            })
            .map(|(node, _)| node.clone())
            .next()?;

        self.sticky_routes.insert(sticky_key, picked.clone());
        Some(picked)
    }
}

fn encode_spec(spec: &ServiceSpec) -> Vec<u8> {
    let record = ServiceSpecRecord {
        name: spec.name.clone(),
        service_bytes: spec.service_bytes.clone(),
        node_filter: spec.node_filter.clone(),
        total_count: spec.total_count,
        per_node_count: spec.per_node_count,
        cache_name: spec.cache_name.clone(),
        affinity_key: spec.affinity_key.clone(),
    };
    rmp_serde::to_vec_named(&record).unwrap_or_default()
}

fn encode_assignment(assignment: &ServiceAssignment) -> Vec<u8> {
    let record = ServiceAssignmentRecord {
        name: assignment.name.clone(),
        topology_version: assignment.topology_version,
        counts: assignment.counts.clone(),
    };
    rmp_serde::to_vec_named(&record).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc as StdArc;

    use async_trait::async_trait;

    use super::*;
    use crate::service::config::ServerConfig;
    use crate::storage::datastores::NullDataStore;
    use crate::storage::engines::HashMapStorage;
    use crate::storage::impls::{DefaultRecordStore, StorageConfig};
    use crate::storage::mutation_observer::CompositeMutationObserver;
    use crate::storage::record_store::RecordStore;

    fn orchestrator(node_id: &str) -> ServiceOrchestrator {
        let store: Arc<dyn RecordStore> = StdArc::new(DefaultRecordStore::new(
            "__system".to_string(),
            0,
            Box::new(HashMapStorage::new()),
            StdArc::new(NullDataStore),
            StdArc::new(CompositeMutationObserver::default()),
            StorageConfig::default(),
        ));
        let system_cache = Arc::new(SystemCache::new(store, node_id.to_string()));
        let ctx = ServiceContext { config: Arc::new(ServerConfig::default()) };
        ServiceOrchestrator::new(node_id.to_string(), system_cache, ctx)
    }

    /// Counts lifecycle calls for the factory-integration tests below.
    struct CountingService {
        init_count: StdArc<AtomicU32>,
        shutdown_count: StdArc<AtomicU32>,
    }

    #[async_trait]
    impl ManagedService for CountingService {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.init_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reset(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            self.shutdown_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn spec(name: &str, total: u32, per_node: u32) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            service_bytes: vec![1, 2, 3],
            node_filter: None,
            total_count: total,
            per_node_count: per_node,
            cache_name: None,
            affinity_key: None,
        }
    }

    #[tokio::test]
    async fn deploy_is_idempotent_for_identical_spec() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn deploy_rejects_conflicting_respec() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        let err = orch.deploy(spec("svc", 2, 1)).await.unwrap_err();
        assert!(matches!(err, CacheError::DeploymentFailure(_)));
    }

    #[tokio::test]
    async fn deploy_rejects_zero_counts() {
        let orch = orchestrator("node-1");
        let err = orch.deploy(spec("svc", 0, 0)).await.unwrap_err();
        assert!(matches!(err, CacheError::DeploymentFailure(_)));
    }

    #[test]
    fn cluster_singleton_assignment_picks_exactly_one_node() {
        let spec = spec("svc", 1, 1);
        let live = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let assignment = compute_service_assignment(&spec, &live, 1, None);
        let total: u32 = assignment.counts.values().sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn node_singleton_assignment_places_one_per_node() {
        let spec = spec("svc", 0, 1);
        let live = vec!["a".to_string(), "b".to_string()];
        let assignment = compute_service_assignment(&spec, &live, 1, None);
        assert_eq!(assignment.counts.get("a").copied(), Some(1));
        assert_eq!(assignment.counts.get("b").copied(), Some(1));
    }

    #[test]
    fn affinity_singleton_pins_to_key_owner() {
        let spec = ServiceSpec {
            affinity_key: Some("user-42".to_string()),
            ..spec("svc", 1, 1)
        };
        let live = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let assignment = compute_service_assignment(&spec, &live, 1, None);
        assert_eq!(assignment.counts.len(), 1);
    }

    #[test]
    fn remainder_distribution_keeps_total_count_exact() {
        let spec = spec("svc", 7, 0);
        let live = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let assignment = compute_service_assignment(&spec, &live, 1, None);
        let total: u32 = assignment.counts.values().sum();
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn recompute_persists_assignment_in_system_cache() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        let live = vec!["node-1".to_string()];
        let assignment = orch.recompute("svc", &live, 1).await.unwrap();
        assert_eq!(assignment.counts.get("node-1").copied(), Some(1));

        let stored = orch
            .system_cache
            .get_assignment(&AssignmentKey { name: "svc".to_string() })
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn reconcile_local_without_a_factory_places_no_instances() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        orch.recompute("svc", &["node-1".to_string()], 1).await.unwrap();

        orch.reconcile_local("svc");
        assert_eq!(orch.local_instance_count("svc"), 0);
    }

    #[tokio::test]
    async fn reconcile_local_spawns_and_cancels_instances_through_managed_service() {
        let orch = orchestrator("node-1");
        let init_count = StdArc::new(AtomicU32::new(0));
        let shutdown_count = StdArc::new(AtomicU32::new(0));
        let (ic, sc) = (init_count.clone(), shutdown_count.clone());
        orch.register_factory("svc", move || {
            StdArc::new(CountingService { init_count: ic.clone(), shutdown_count: sc.clone() })
                as Arc<dyn ManagedService>
        });

        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        orch.recompute("svc", &["node-1".to_string()], 1).await.unwrap();

        orch.reconcile_local("svc");
        assert_eq!(orch.local_instance_count("svc"), 1);
        tokio::task::yield_now().await;
        assert_eq!(init_count.load(Ordering::SeqCst), 1);

        orch.cancel("svc").await.unwrap();
        assert_eq!(orch.local_instance_count("svc"), 0);
        tokio::task::yield_now().await;
        assert_eq!(shutdown_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_proxy_prefers_local_instance() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 1, 1)).await.unwrap();
        orch.recompute("svc", &["node-1".to_string(), "node-2".to_string()], 1)
            .await
            .unwrap();

        let target = orch.service_proxy_target("caller-1", None, "svc");
        assert!(target.is_some());
    }

    #[tokio::test]
    async fn service_proxy_pins_remote_callers_to_the_same_node() {
        let orch = orchestrator("node-1");
        orch.deploy(spec("svc", 0, 1)).await.unwrap();
        orch.recompute("svc", &["node-2".to_string(), "node-3".to_string()], 1)
            .await
            .unwrap();

        let first = orch.service_proxy_target("caller-1", None, "svc").unwrap();
        for _ in 0..10 {
            assert_eq!(orch.service_proxy_target("caller-1", None, "svc").unwrap(), first);
        }

        // A different caller isn't forced onto the same pin.
        let _ = orch.service_proxy_target("caller-2", None, "svc").unwrap();
    }
}
