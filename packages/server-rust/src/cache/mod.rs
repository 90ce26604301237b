//! Cache-level subsystems layered on top of `storage::*` and `cluster::*`:
//! the write path (synchrony/atomicity across primary and backups) and the
//! thin system cache used by the orchestrator and continuous query manager
//! for internal bookkeeping.

pub mod config;
pub mod messages;
pub mod system_cache;
pub mod write_path;

pub use config::{
    CacheConfig, CodeDistributionPolicy, ContinuousQueryConfig, EvictionConfig, RebalanceMode,
    ServiceOrchestratorConfig,
};
pub use system_cache::{AssignmentKey, DeploymentKey, SystemCache};
pub use write_path::{AtomicityMode, EntryVersion, WriteOutcome, WritePath, WriteSync};

use thiserror::Error;

/// Cache-wide error type shared by the write path, continuous query manager,
/// and service orchestrator.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("topology changed mid-operation")]
    TopologyChanged,
    #[error("partition {0} is not owned by this node")]
    PartitionNotOwned(u32),
    #[error("optimistic transaction conflict on key {0:?}")]
    TransactionOptimisticConflict(String),
    #[error("lock acquisition timed out for key {0:?}")]
    LockTimeout(String),
    #[error("service deployment failed: {0}")]
    DeploymentFailure(String),
    #[error("peer class loading failed for {0}")]
    PeerClassLoadingFailure(String),
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] crate::cluster::transport::TransportError),
    #[error("invalid cache configuration: {0}")]
    ConfigurationError(String),
}
