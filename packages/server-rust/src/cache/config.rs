//! Recognized configuration options for the cache subsystems, in the same
//! plain-struct-plus-`Default` shape as `cluster::types::ClusterConfig` and
//! `service::config::ServerConfig`. A CLI/env overlay (`clap`, as in
//! `bin/test_server.rs`) is the process entry point's concern, not this
//! struct's.

use serde::{Deserialize, Serialize};

use super::write_path::{AtomicityMode, WriteSync};

/// How partition rebalancing traffic is driven after a topology change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceMode {
    /// Rebalance batches are applied and acked before the topology change
    /// that triggered them is considered settled.
    Sync,
    /// Rebalance runs in the background; the topology change is considered
    /// settled immediately.
    Async,
    /// No automatic rebalancing; partitions keep whatever owner they had
    /// before the change until an operator triggers one explicitly.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousQueryConfig {
    pub buffer_size: usize,
    pub time_interval_ms: u64,
    pub auto_unsubscribe: bool,
}

impl Default for ContinuousQueryConfig {
    fn default() -> Self {
        Self { buffer_size: 1000, time_interval_ms: 0, auto_unsubscribe: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOrchestratorConfig {
    pub retry_timeout_ms: u64,
}

impl Default for ServiceOrchestratorConfig {
    fn default() -> Self {
        Self { retry_timeout_ms: 5000 }
    }
}

/// How a node obtains the executable bytes for a deployed service it's
/// asked to host. Only `PreDeployed` is implemented; the other two variants
/// are named so a future peer-distribution mechanism has a slot to land in
/// without reshaping `CacheConfig` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeDistributionPolicy {
    /// Every node already has `service_bytes` resolvable locally (e.g. the
    /// same binary, or a side-loaded plugin directory); `deploy` only needs
    /// to persist the spec, never ship code.
    PreDeployed,
    /// Fetch `service_bytes` from the depositing node on first placement.
    PeerClassLoading,
    /// Fetch `service_bytes` from an external artifact store by content hash.
    ArtifactFetch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    pub max_blocks: Option<u64>,
    pub max_bytes: Option<u64>,
    pub exclude_paths: Vec<String>,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self { max_blocks: None, max_bytes: None, exclude_paths: Vec::new() }
    }
}

/// Recognized cache-subsystem options, covering the write path, rebalancing,
/// continuous queries, the service orchestrator, and eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backups: u32,
    /// Power-of-two partition count; see `topgun_core::affinity`.
    pub partitions: u32,
    pub atomicity: AtomicityMode,
    pub write_sync: WriteSync,
    pub rebalance_mode: RebalanceMode,
    pub rebalance_batch_size: usize,
    pub continuous_query: ContinuousQueryConfig,
    pub service: ServiceOrchestratorConfig,
    pub eviction: EvictionConfig,
    pub code_distribution: CodeDistributionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backups: 1,
            partitions: 256,
            atomicity: AtomicityMode::Atomic,
            write_sync: WriteSync::PrimarySync,
            rebalance_mode: RebalanceMode::Sync,
            rebalance_batch_size: 1000,
            continuous_query: ContinuousQueryConfig::default(),
            service: ServiceOrchestratorConfig::default(),
            eviction: EvictionConfig::default(),
            code_distribution: CodeDistributionPolicy::PreDeployed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_partitions_is_power_of_two() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.partitions & (cfg.partitions - 1), 0);
    }

    #[test]
    fn default_rebalance_batch_size_is_1000() {
        assert_eq!(CacheConfig::default().rebalance_batch_size, 1000);
    }

    #[test]
    fn default_code_distribution_is_pre_deployed() {
        assert_eq!(CacheConfig::default().code_distribution, CodeDistributionPolicy::PreDeployed);
    }

    #[test]
    fn default_backups_is_one() {
        assert_eq!(CacheConfig::default().backups, 1);
    }
}
