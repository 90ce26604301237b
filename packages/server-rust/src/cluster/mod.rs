//! Cluster protocol module.
//!
//! Provides domain types, service traits, wire messages, shared state,
//! failure detection, and partition assignment algorithms for the
//! inter-node cluster protocol.

pub mod assignment;
pub mod failure_detector;
pub mod messages;
pub mod partition_fsm;
pub mod state;
pub mod traits;
pub mod transport;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports — flat public API
// ---------------------------------------------------------------------------

// types
pub use types::{
    ActiveMigration, ClusterConfig, ClusterHealth, MemberInfo, MembersView, MigrationPhase,
    MigrationTask, NodeState, PartitionAssignment, PartitionLifecycle, PartitionMeta,
    PartitionState,
};

// partition_fsm
pub use partition_fsm::{batch_entries, IllegalTransition, PartitionFsm, RebalanceBatch};

// transport
pub use transport::{ClusterTransport, InProcessTransport, NodeId, TopicId, TransportError};

// traits
pub use traits::{
    ClusterPartitionService, ClusterService, FailureDetector, MembershipService, MigrationService,
};

// messages
pub use messages::{
    ClusterMessage, DeltaOp, ExplicitSuspicionPayload, HeartbeatComplaintPayload,
    HeartbeatPayload, JoinRequestPayload, JoinResponsePayload, LeaveRequestPayload, MapStateChunk,
    MapType, MembersUpdatePayload, MigrateCancelPayload, MigrateDataPayload,
    MigrateFinalizePayload, MigrateReadyPayload, MigrateStartPayload, MergeRequestPayload,
    OpForwardPayload, PartitionTableUpdatePayload, SplitBrainProbePayload,
    SplitBrainProbeResponsePayload,
};

// state
pub use state::{
    ClusterChange, ClusterChannelReceivers, ClusterChannels, ClusterPartitionTable, ClusterState,
    InboundClusterMessage, MigrationCommand,
};

// failure_detector
pub use failure_detector::{DeadlineFailureDetector, PhiAccrualConfig, PhiAccrualFailureDetector};

// assignment
pub use assignment::{compute_assignment, order_migrations, plan_rebalance};

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------
