//! Cluster domain payload structs for partition map distribution, inter-node
//! subscription forwarding, and distributed search coordination.
//!
//! These types correspond to the TypeScript Zod schemas in
//! `packages/core/src/schemas/cluster-schemas.ts`. All structs use
//! `#[serde(rename_all = "camelCase")]` to produce wire-compatible
//! `MsgPack` output via `rmp_serde::to_vec_named()`.

use serde::{Deserialize, Serialize};

use super::base::{ChangeEventType, Query};
use super::query::QueryResultEntry;
use super::search::{SearchOptions, SearchResultEntry};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a node within the cluster.
///
/// Maps to the inline `z.enum(...)` in `NodeInfoSchema.status` in
/// `cluster-schemas.ts`. Variant names use `SCREAMING_CASE` to match
/// TS wire values directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum NodeStatus {
    ACTIVE,
    JOINING,
    LEAVING,
    SUSPECTED,
    FAILED,
}

// ---------------------------------------------------------------------------
// Partition Map types
// ---------------------------------------------------------------------------

/// Network endpoints for a cluster node.
///
/// Maps to the inline `endpoints` object in `NodeInfoSchema` in
/// `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEndpoints {
    /// WebSocket endpoint URL.
    pub websocket: String,

    /// Optional HTTP endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http: Option<String>,
}

/// Information about a single node in the cluster.
///
/// Maps to `NodeInfoSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Unique identifier for this node.
    pub node_id: String,

    /// Network endpoints for reaching this node.
    pub endpoints: NodeEndpoints,

    /// Current membership status.
    pub status: NodeStatus,
}

/// Ownership information for a single partition.
///
/// Maps to `PartitionInfoSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    /// Partition identifier (0-based).
    pub partition_id: u32,

    /// Node ID of the partition owner.
    pub owner_node_id: String,

    /// Node IDs holding backup replicas.
    pub backup_node_ids: Vec<String>,
}

/// Full partition map describing cluster topology.
///
/// Maps to `PartitionMapPayloadSchema` in `cluster-schemas.ts`.
/// Distributed to clients so they can route operations directly to
/// the owning node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionMapPayload {
    /// Monotonically increasing version for optimistic staleness detection.
    pub version: u32,

    /// Total number of partitions in the cluster (typically 271).
    pub partition_count: u32,

    /// All known cluster nodes and their endpoints.
    pub nodes: Vec<NodeInfo>,

    /// Assignment of partitions to nodes.
    pub partitions: Vec<PartitionInfo>,

    /// Timestamp (ms since epoch) when this map was generated.
    pub generated_at: i64,
}

/// Payload for requesting the current partition map.
///
/// Maps to the `payload` of `PartitionMapRequestSchema` in `cluster-schemas.ts`.
/// Includes the client's current version for delta comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionMapRequestPayload {
    /// Client's current partition map version, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_version: Option<u32>,
}

// ---------------------------------------------------------------------------
// Cluster-internal query subscription forwarding
// ---------------------------------------------------------------------------
//
// A continuous query subscribes against a single map, but the map's keys are
// spread across every partition in the cluster. The node that owns the
// client's websocket connection forwards the subscription to every other
// node, each registering it against its own locally-owned partitions and
// acking back an initial result page from that node's share of the data.

/// Forwards a query subscription from the owning node to a peer for
/// registration against that peer's locally-owned partitions.
///
/// Maps to `ClusterSubRegisterSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubRegisterPayload {
    /// Subscription identifier, shared across all nodes holding this subscription.
    pub subscription_id: String,
    /// Node that owns the originating client connection.
    pub origin_node_id: String,
    /// Name of the map being queried.
    pub map_name: String,
    /// The query parameters (filter, sort, pagination).
    pub query: Query,
}

/// Acknowledges registration of a forwarded subscription, including the
/// initial matching results from the acking node's local partitions.
///
/// Maps to `ClusterSubAckSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubAckPayload {
    /// Subscription identifier this ack refers to.
    pub subscription_id: String,
    /// Node acknowledging registration.
    pub node_id: String,
    /// Whether registration on this node succeeded.
    pub success: bool,
    /// Reason registration failed, if `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Initial matches from this node's local partitions, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub initial_results: Option<Vec<QueryResultEntry>>,
    /// Total count of matches on this node, for result-size bookkeeping.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_hits: Option<u32>,
}

/// Propagates a matching change from a peer node back to the subscription's
/// origin node, for delivery to the client.
///
/// Maps to `ClusterSubUpdateSchema` in `cluster-schemas.ts`. Mirrors
/// [`super::client_events::QueryUpdatePayload`] plus the subscription-owning node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubUpdatePayload {
    /// Subscription identifier this update belongs to.
    pub subscription_id: String,
    /// Node reporting the change.
    pub node_id: String,
    /// Key of the changed record.
    pub key: String,
    /// New value, or `None` if the change is a removal.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<rmpv::Value>,
    /// Kind of change that occurred.
    pub change_type: ChangeEventType,
}

/// Tears down a forwarded subscription on every node holding it.
///
/// Maps to `ClusterSubUnregisterSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubUnregisterPayload {
    /// Subscription identifier to tear down.
    pub subscription_id: String,
}

// ---------------------------------------------------------------------------
// Cluster-internal search forwarding
// ---------------------------------------------------------------------------
//
// Full-text search fans out the same way continuous queries do: the owning
// node scatters the request to every peer and gathers per-node result pages.

/// Forwards a one-shot search request to a peer node.
///
/// Maps to `ClusterSearchReqSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchReqPayload {
    /// Request identifier, shared across all nodes searched for this request.
    pub request_id: String,
    /// Node that owns the originating client connection.
    pub origin_node_id: String,
    /// Name of the map being searched.
    pub map_name: String,
    /// Search query string.
    pub query: String,
    /// Optional search options (limit, scoring, boosts).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<SearchOptions>,
}

/// Per-node search results for a forwarded search request.
///
/// Maps to `ClusterSearchRespSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchRespPayload {
    /// Request identifier this response refers to.
    pub request_id: String,
    /// Node returning these results.
    pub node_id: String,
    /// Matching results from this node's local partitions.
    pub results: Vec<SearchResultEntry>,
    /// Total count of matches on this node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_count: Option<u32>,
    /// Error message if this node's search failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Forwards a live search subscription to a peer for registration against
/// that peer's locally-owned partitions.
///
/// Maps to `ClusterSearchSubscribeSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchSubscribePayload {
    /// Subscription identifier, shared across all nodes holding this subscription.
    pub subscription_id: String,
    /// Node that owns the originating client connection.
    pub origin_node_id: String,
    /// Name of the map being searched.
    pub map_name: String,
    /// Search query string.
    pub query: String,
    /// Optional search options (limit, scoring, boosts).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<SearchOptions>,
}

/// Tears down a forwarded search subscription on every node holding it.
///
/// Maps to `ClusterSearchUnsubscribeSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchUnsubscribePayload {
    /// Subscription identifier to tear down.
    pub subscription_id: String,
}

/// Propagates a live search match from a peer node back to the subscription's
/// origin node, for delivery to the client.
///
/// Maps to `ClusterSearchUpdateSchema` in `cluster-schemas.ts`. Mirrors
/// [`super::search::SearchUpdatePayload`] plus the subscription-owning node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchUpdatePayload {
    /// Subscription identifier this update belongs to.
    pub subscription_id: String,
    /// Node reporting the change.
    pub node_id: String,
    /// Key of the changed record.
    pub key: String,
    /// New value, or `None` if the change is a removal.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<rmpv::Value>,
    /// Relevance score of the match.
    pub score: f64,
    /// Terms that matched, for highlighting.
    pub matched_terms: Vec<String>,
    /// Kind of change that occurred.
    pub change_type: ChangeEventType,
}
