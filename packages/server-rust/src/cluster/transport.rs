//! Ordered point-to-point transport for cluster wire messages.
//!
//! `ClusterTransport` is the narrow send-side contract the rest of the
//! cluster protocol depends on: a topic, a destination node, and a payload
//! already serialized to bytes. A real implementation would hand the bytes
//! to a TCP/QUIC connection registered in `network::*`; `InProcessTransport`
//! is an in-memory fake for single-process tests, following the same
//! real-impl/test-double split as `PhiAccrualFailureDetector` and
//! `DeadlineFailureDetector`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Logical channel a message is sent on (e.g. one per wire message family).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicId(pub String);

impl TopicId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Identifies a cluster member as a transport destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Failure modes a `ClusterTransport` implementation can report.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no route to node {0:?}")]
    UnknownNode(NodeId),
    #[error("send queue to {0:?} is closed")]
    Closed(NodeId),
}

/// Sends serialized cluster messages to a specific node, preserving FIFO
/// order per `(topic, destination)` pair.
///
/// Ordering is required for the migration protocol: `MigrateData` chunks for
/// a partition must arrive in the order they were sent, and `MigrateReady`
/// must arrive after the last chunk.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    async fn send_ordered(
        &self,
        topic: &TopicId,
        node: &NodeId,
        bytes: Bytes,
    ) -> Result<(), TransportError>;
}

/// In-process fake transport: delivers to an in-memory `mpsc` queue per
/// destination node instead of a real socket. Used by tests that need to
/// exercise send-side call sites (write-path forwarding, rebalance batching)
/// without a network.
pub struct InProcessTransport {
    queues: Mutex<HashMap<NodeId, mpsc::UnboundedSender<(TopicId, Bytes)>>>,
}

impl InProcessTransport {
    #[must_use]
    pub fn new() -> Self {
        Self { queues: Mutex::new(HashMap::new()) }
    }

    /// Registers `node` as a deliverable destination and returns the
    /// receiving end of its queue. Sending to an unregistered node fails
    /// with [`TransportError::UnknownNode`].
    pub fn register(&self, node: NodeId) -> mpsc::UnboundedReceiver<(TopicId, Bytes)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.lock().insert(node, tx);
        rx
    }

    pub fn deregister(&self, node: &NodeId) {
        self.queues.lock().remove(node);
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterTransport for InProcessTransport {
    async fn send_ordered(
        &self,
        topic: &TopicId,
        node: &NodeId,
        bytes: Bytes,
    ) -> Result<(), TransportError> {
        let sender = {
            let queues = self.queues.lock();
            queues
                .get(node)
                .cloned()
                .ok_or_else(|| TransportError::UnknownNode(node.clone()))?
        };

        sender
            .send((topic.clone(), bytes))
            .map_err(|_| TransportError::Closed(node.clone()))
    }
}

/// Shared handle suitable for passing into services that only ever send.
pub type SharedTransport = Arc<dyn ClusterTransport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_to_registered_node_is_delivered() {
        let transport = InProcessTransport::new();
        let mut rx = transport.register(NodeId::new("node-a"));

        transport
            .send_ordered(&TopicId::new("migrate"), &NodeId::new("node-a"), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let (topic, bytes) = rx.recv().await.unwrap();
        assert_eq!(topic, TopicId::new("migrate"));
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn send_to_unknown_node_errors() {
        let transport = InProcessTransport::new();
        let err = transport
            .send_ordered(&TopicId::new("migrate"), &NodeId::new("ghost"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn messages_to_same_node_preserve_order() {
        let transport = InProcessTransport::new();
        let mut rx = transport.register(NodeId::new("node-a"));
        let topic = TopicId::new("migrate");

        for i in 0..5u8 {
            transport
                .send_ordered(&topic, &NodeId::new("node-a"), Bytes::from(vec![i]))
                .await
                .unwrap();
        }

        for i in 0..5u8 {
            let (_, bytes) = rx.recv().await.unwrap();
            assert_eq!(bytes[0], i);
        }
    }

    #[tokio::test]
    async fn deregister_causes_subsequent_sends_to_fail() {
        let transport = InProcessTransport::new();
        let _rx = transport.register(NodeId::new("node-a"));
        transport.deregister(&NodeId::new("node-a"));

        let err = transport
            .send_ordered(&TopicId::new("migrate"), &NodeId::new("node-a"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownNode(_)));
    }
}
