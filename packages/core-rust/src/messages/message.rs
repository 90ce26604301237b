//! The top-level client-server wire message.
//!
//! Internally tagged on `"type"` with `SCREAMING_SNAKE_CASE` variant names,
//! mirroring the discriminated union in `packages/core/src/schemas/*.ts`.
//! Variants that wrap an existing `*Message` type carry it as a newtype;
//! variants whose TS schema has no dedicated message wrapper (the payload
//! struct IS the message body) carry a `payload` field directly.

use serde::{Deserialize, Serialize};

use super::client_events::{
    AuthAckData, AuthFailData, ErrorPayload, GcPrunePayload, LockGrantedPayload,
    LockReleasedPayload, QueryUpdatePayload, ServerBatchEventPayload, ServerEventPayload,
    SyncResetRequiredPayload,
};
use super::cluster::{
    ClusterSearchReqPayload, ClusterSearchRespPayload, ClusterSearchSubscribePayload,
    ClusterSearchUnsubscribePayload, ClusterSearchUpdatePayload, ClusterSubAckPayload,
    ClusterSubRegisterPayload, ClusterSubUnregisterPayload, ClusterSubUpdatePayload,
    PartitionMapPayload, PartitionMapRequestPayload,
};
use super::messaging::{
    CounterRequestPayload, CounterStatePayload, EntryProcessBatchData,
    EntryProcessBatchResponseData, EntryProcessData, EntryProcessResponseData,
    JournalEventMessageData, JournalReadData, JournalReadResponseData, JournalSubscribeData,
    JournalUnsubscribeData, ListResolversData, ListResolversResponseData, LockReleasePayload,
    LockRequestPayload, MergeRejectedData, PingData, PongData, RegisterResolverData,
    RegisterResolverResponseData, TopicMessageEventPayload, TopicPubPayload, TopicSubPayload,
    TopicUnsubPayload, UnregisterResolverData, UnregisterResolverResponseData,
};
use super::query::{QueryRespMessage, QuerySubMessage, QueryUnsubMessage};
use super::search::{
    SearchPayload, SearchRespPayload, SearchSubPayload, SearchUnsubPayload, SearchUpdatePayload,
};
use super::sync::{
    BatchMessage, ClientOpMessage, MerkleReqBucketMessage, ORMapDiffRequest, ORMapDiffResponse,
    ORMapMerkleReqBucket, ORMapPushDiff, ORMapSyncInit, ORMapSyncRespBuckets, ORMapSyncRespLeaf,
    ORMapSyncRespRoot, OpAckMessage, OpBatchMessage, OpRejectedMessage, SyncInitMessage,
    SyncRespBucketsMessage, SyncRespLeafMessage, SyncRespRootMessage,
};
use super::base::{AuthMessage, AuthRequiredMessage};

/// Top-level client-server protocol message.
///
/// Covers CRDT writes, LWW/OR-Map synchronization, continuous queries,
/// pub-sub topics, distributed locks and counters, full-text search,
/// the audit journal, and cluster-internal subscription/search forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // ----- CRDT domain -----
    ClientOp(ClientOpMessage),
    OpBatch(OpBatchMessage),

    // ----- Sync domain (LWW) -----
    SyncInit(SyncInitMessage),
    MerkleReqBucket(MerkleReqBucketMessage),
    SyncRespRoot(SyncRespRootMessage),
    SyncRespBuckets(SyncRespBucketsMessage),
    SyncRespLeaf(SyncRespLeafMessage),

    // ----- Sync domain (OR-Map) -----
    #[serde(rename = "OR_MAP_SYNC_INIT")]
    ORMapSyncInit(ORMapSyncInit),
    #[serde(rename = "OR_MAP_MERKLE_REQ_BUCKET")]
    ORMapMerkleReqBucket(ORMapMerkleReqBucket),
    #[serde(rename = "OR_MAP_DIFF_REQUEST")]
    ORMapDiffRequest(ORMapDiffRequest),
    #[serde(rename = "OR_MAP_PUSH_DIFF")]
    ORMapPushDiff(ORMapPushDiff),
    #[serde(rename = "OR_MAP_SYNC_RESP_ROOT")]
    ORMapSyncRespRoot(ORMapSyncRespRoot),
    #[serde(rename = "OR_MAP_SYNC_RESP_BUCKETS")]
    ORMapSyncRespBuckets(ORMapSyncRespBuckets),
    #[serde(rename = "OR_MAP_SYNC_RESP_LEAF")]
    ORMapSyncRespLeaf(ORMapSyncRespLeaf),
    #[serde(rename = "OR_MAP_DIFF_RESPONSE")]
    ORMapDiffResponse(ORMapDiffResponse),

    // ----- Write concern responses -----
    OpAck(OpAckMessage),
    OpRejected(OpRejectedMessage),

    // ----- Query domain -----
    QuerySub(QuerySubMessage),
    QueryUnsub(QueryUnsubMessage),
    QueryResp(QueryRespMessage),
    QueryUpdate { payload: QueryUpdatePayload },

    // ----- Messaging domain: topics -----
    TopicSub { payload: TopicSubPayload },
    TopicUnsub { payload: TopicUnsubPayload },
    TopicPub { payload: TopicPubPayload },
    TopicMessage { payload: TopicMessageEventPayload },

    // ----- Coordination domain: locks, heartbeat, partition map -----
    LockRequest { payload: LockRequestPayload },
    LockRelease { payload: LockReleasePayload },
    LockGranted { payload: LockGrantedPayload },
    LockReleased { payload: LockReleasedPayload },
    PartitionMapRequest { payload: Option<PartitionMapRequestPayload> },
    PartitionMap { payload: PartitionMapPayload },
    Ping(PingData),
    Pong(PongData),

    // ----- Search domain -----
    Search { payload: SearchPayload },
    SearchSub { payload: SearchSubPayload },
    SearchUnsub { payload: SearchUnsubPayload },
    SearchResp { payload: SearchRespPayload },
    SearchUpdate { payload: SearchUpdatePayload },

    // ----- Persistence domain: PN-Counters -----
    CounterRequest { payload: CounterRequestPayload },
    CounterSync { payload: CounterStatePayload },
    CounterResponse { payload: CounterStatePayload },
    CounterUpdate { payload: CounterStatePayload },

    // ----- Persistence domain: entry processors -----
    EntryProcess(EntryProcessData),
    EntryProcessBatch(EntryProcessBatchData),
    EntryProcessResponse(EntryProcessResponseData),
    EntryProcessBatchResponse(EntryProcessBatchResponseData),

    // ----- Persistence domain: audit journal -----
    JournalSubscribe(JournalSubscribeData),
    JournalUnsubscribe(JournalUnsubscribeData),
    JournalRead(JournalReadData),
    JournalReadResponse(JournalReadResponseData),
    JournalEvent { payload: JournalEventMessageData },

    // ----- Persistence domain: conflict resolvers -----
    RegisterResolver(RegisterResolverData),
    RegisterResolverResponse(RegisterResolverResponseData),
    UnregisterResolver(UnregisterResolverData),
    UnregisterResolverResponse(UnregisterResolverResponseData),
    ListResolvers(ListResolversData),
    ListResolversResponse(ListResolversResponseData),
    MergeRejected(MergeRejectedData),

    // ----- Server push events -----
    ServerEvent { payload: ServerEventPayload },
    ServerBatchEvent { payload: ServerBatchEventPayload },
    GcPrune { payload: GcPrunePayload },
    SyncResetRequired { payload: SyncResetRequiredPayload },
    Error { payload: ErrorPayload },

    // ----- Auth -----
    Auth(AuthMessage),
    AuthRequired(AuthRequiredMessage),
    AuthAck(AuthAckData),
    AuthFail(AuthFailData),

    // ----- Transport envelope -----
    Batch(BatchMessage),

    // ----- Cluster-internal query subscription forwarding -----
    ClusterSubRegister { payload: ClusterSubRegisterPayload },
    ClusterSubAck { payload: ClusterSubAckPayload },
    ClusterSubUpdate { payload: ClusterSubUpdatePayload },
    ClusterSubUnregister { payload: ClusterSubUnregisterPayload },

    // ----- Cluster-internal search forwarding -----
    ClusterSearchReq { payload: ClusterSearchReqPayload },
    ClusterSearchResp { payload: ClusterSearchRespPayload },
    ClusterSearchSubscribe { payload: ClusterSearchSubscribePayload },
    ClusterSearchUnsubscribe { payload: ClusterSearchUnsubscribePayload },
    ClusterSearchUpdate { payload: ClusterSearchUpdatePayload },
}
