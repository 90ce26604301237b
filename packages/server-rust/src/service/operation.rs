//! Typed operation variants produced by classifying a `Message` and dispatched
//! through the `OperationRouter` to a domain service.

use topgun_core::messages::cluster::PartitionMapRequestPayload;
use topgun_core::messages::messaging::{
    CounterRequestPayload, CounterStatePayload, EntryProcessBatchData, EntryProcessData,
    JournalReadData, JournalSubscribeData, JournalUnsubscribeData, ListResolversData,
    LockReleasePayload, LockRequestPayload, PingData, RegisterResolverData, TopicPubPayload,
    TopicSubPayload, TopicUnsubPayload, UnregisterResolverData,
};
use topgun_core::messages::query::{QuerySubMessage, QueryUnsubMessage};
use topgun_core::messages::search::{SearchPayload, SearchSubPayload, SearchUnsubPayload};
use topgun_core::messages::sync::{
    ClientOpMessage, MerkleReqBucketMessage, ORMapDiffRequest, ORMapMerkleReqBucket,
    ORMapPushDiff, ORMapSyncInit, OpBatchMessage, SyncInitMessage,
};

/// String constants identifying each domain service, used both to register
/// services in the `OperationRouter` and to tag an `OperationContext`.
pub mod service_names {
    pub const CRDT: &str = "crdt";
    pub const SYNC: &str = "sync";
    pub const QUERY: &str = "query";
    pub const MESSAGING: &str = "messaging";
    pub const COORDINATION: &str = "coordination";
    pub const SEARCH: &str = "search";
    pub const PERSISTENCE: &str = "persistence";
}

/// Origin of the operation caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    Client,
    Forwarded,
    Backup,
    Wan,
    System,
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub partition_id: Option<u32>,
    pub service_name: &'static str,
    pub caller_origin: CallerOrigin,
    pub client_id: Option<String>,
    pub caller_node_id: Option<String>,
    pub timestamp: topgun_core::Timestamp,
    pub call_timeout_ms: u64,
}

impl OperationContext {
    /// Creates a context for a freshly classified client operation.
    ///
    /// `caller_origin` defaults to `Client` and `partition_id`/`client_id`/
    /// `caller_node_id` default to `None`; callers mutate the fields they need
    /// (see `OperationService::make_ctx`).
    #[must_use]
    pub fn new(
        call_id: u64,
        service_name: &'static str,
        timestamp: topgun_core::Timestamp,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            call_id,
            partition_id: None,
            service_name,
            caller_origin: CallerOrigin::Client,
            client_id: None,
            caller_node_id: None,
            timestamp,
            call_timeout_ms,
        }
    }
}

/// Typed operation variants dispatched through the pipeline.
///
/// Each variant other than `GarbageCollect` corresponds to a client-to-server
/// `Message` variant classified by `OperationService::classify`.
#[derive(Debug)]
pub enum Operation {
    // ----- CRDT domain -----
    ClientOp { ctx: OperationContext, payload: ClientOpMessage },
    OpBatch { ctx: OperationContext, payload: OpBatchMessage },

    // ----- Sync domain -----
    SyncInit { ctx: OperationContext, payload: SyncInitMessage },
    MerkleReqBucket { ctx: OperationContext, payload: MerkleReqBucketMessage },
    ORMapSyncInit { ctx: OperationContext, payload: ORMapSyncInit },
    ORMapMerkleReqBucket { ctx: OperationContext, payload: ORMapMerkleReqBucket },
    ORMapDiffRequest { ctx: OperationContext, payload: ORMapDiffRequest },
    ORMapPushDiff { ctx: OperationContext, payload: ORMapPushDiff },

    // ----- Query domain -----
    QuerySubscribe { ctx: OperationContext, payload: QuerySubMessage },
    QueryUnsubscribe { ctx: OperationContext, payload: QueryUnsubMessage },

    // ----- Messaging domain -----
    TopicSubscribe { ctx: OperationContext, payload: TopicSubPayload },
    TopicUnsubscribe { ctx: OperationContext, payload: TopicUnsubPayload },
    TopicPublish { ctx: OperationContext, payload: TopicPubPayload },

    // ----- Coordination domain -----
    LockRequest { ctx: OperationContext, payload: LockRequestPayload },
    LockRelease { ctx: OperationContext, payload: LockReleasePayload },
    PartitionMapRequest { ctx: OperationContext, payload: Option<PartitionMapRequestPayload> },
    Ping { ctx: OperationContext, payload: PingData },
    /// Internal maintenance operation, not produced by `classify` -- triggered
    /// by the background worker's GC tick.
    GarbageCollect { ctx: OperationContext },

    // ----- Search domain -----
    Search { ctx: OperationContext, payload: SearchPayload },
    SearchSubscribe { ctx: OperationContext, payload: SearchSubPayload },
    SearchUnsubscribe { ctx: OperationContext, payload: SearchUnsubPayload },

    // ----- Persistence domain -----
    CounterRequest { ctx: OperationContext, payload: CounterRequestPayload },
    CounterSync { ctx: OperationContext, payload: CounterStatePayload },
    EntryProcess { ctx: OperationContext, payload: EntryProcessData },
    EntryProcessBatch { ctx: OperationContext, payload: EntryProcessBatchData },
    RegisterResolver { ctx: OperationContext, payload: RegisterResolverData },
    UnregisterResolver { ctx: OperationContext, payload: UnregisterResolverData },
    ListResolvers { ctx: OperationContext, payload: ListResolversData },
    JournalSubscribe { ctx: OperationContext, payload: JournalSubscribeData },
    JournalUnsubscribe { ctx: OperationContext, payload: JournalUnsubscribeData },
    JournalRead { ctx: OperationContext, payload: JournalReadData },
}

impl Operation {
    /// Borrows the `OperationContext` carried by this operation, regardless of variant.
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Operation::ClientOp { ctx, .. }
            | Operation::OpBatch { ctx, .. }
            | Operation::SyncInit { ctx, .. }
            | Operation::MerkleReqBucket { ctx, .. }
            | Operation::ORMapSyncInit { ctx, .. }
            | Operation::ORMapMerkleReqBucket { ctx, .. }
            | Operation::ORMapDiffRequest { ctx, .. }
            | Operation::ORMapPushDiff { ctx, .. }
            | Operation::QuerySubscribe { ctx, .. }
            | Operation::QueryUnsubscribe { ctx, .. }
            | Operation::TopicSubscribe { ctx, .. }
            | Operation::TopicUnsubscribe { ctx, .. }
            | Operation::TopicPublish { ctx, .. }
            | Operation::LockRequest { ctx, .. }
            | Operation::LockRelease { ctx, .. }
            | Operation::PartitionMapRequest { ctx, .. }
            | Operation::Ping { ctx, .. }
            | Operation::GarbageCollect { ctx }
            | Operation::Search { ctx, .. }
            | Operation::SearchSubscribe { ctx, .. }
            | Operation::SearchUnsubscribe { ctx, .. }
            | Operation::CounterRequest { ctx, .. }
            | Operation::CounterSync { ctx, .. }
            | Operation::EntryProcess { ctx, .. }
            | Operation::EntryProcessBatch { ctx, .. }
            | Operation::RegisterResolver { ctx, .. }
            | Operation::UnregisterResolver { ctx, .. }
            | Operation::ListResolvers { ctx, .. }
            | Operation::JournalSubscribe { ctx, .. }
            | Operation::JournalUnsubscribe { ctx, .. }
            | Operation::JournalRead { ctx, .. } => ctx,
        }
    }
}

/// Successful response from an operation handler.
#[derive(Debug)]
pub enum OperationResponse {
    Ack { call_id: u64 },
    Message(Box<topgun_core::messages::Message>),
    Messages(Vec<topgun_core::messages::Message>),
    NotImplemented { service_name: &'static str, call_id: u64 },
    Empty,
}

/// Errors returned by operation handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("wrong service for operation")]
    WrongService,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors from classifying a `Message` into an `Operation`.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("server-to-client response cannot be classified as operation: {variant}")]
    ServerToClient { variant: &'static str },
    #[error("transport envelope must be unpacked before classification: {variant}")]
    TransportEnvelope { variant: &'static str },
    #[error("authentication message handled at transport layer: {variant}")]
    AuthMessage { variant: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> OperationContext {
        OperationContext::new(
            1,
            service_names::CRDT,
            topgun_core::Timestamp { millis: 0, counter: 0, node_id: "n".to_string() },
            1000,
        )
    }

    #[test]
    fn new_defaults_client_origin_and_no_partition() {
        let c = ctx();
        assert_eq!(c.caller_origin, CallerOrigin::Client);
        assert_eq!(c.partition_id, None);
        assert_eq!(c.client_id, None);
        assert_eq!(c.caller_node_id, None);
    }

    #[test]
    fn ctx_accessor_returns_the_context_for_every_variant_shape() {
        let op = Operation::GarbageCollect { ctx: ctx() };
        assert_eq!(op.ctx().call_id, 1);

        let op = Operation::Ping { ctx: ctx(), payload: PingData { timestamp: 0 } };
        assert_eq!(op.ctx().service_name, service_names::CRDT);
    }
}
