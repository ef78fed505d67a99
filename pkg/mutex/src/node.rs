use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use pkg_clock::LamportClock;
use pkg_types::message::{MessageKind, PeerMessage};

use crate::transport::MessageTransport;

/// Where a node stands with respect to the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not interested in the critical section.
    Released,
    /// Waiting for permission from every peer.
    Wanted,
    /// Inside the critical section.
    Held,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Released => write!(f, "Released"),
            NodeState::Wanted => write!(f, "Wanted"),
            NodeState::Held => write!(f, "Held"),
        }
    }
}

struct NodeInner {
    state: NodeState,
    /// Timestamp of the outstanding request; meaningful while Wanted or Held.
    request_ts: u64,
    /// Peers still owed to us before we may enter.
    replies_needed: HashSet<String>,
    /// Peers we owe a REPLY, in arrival order.
    deferred_replies: Vec<String>,
    /// Single-use signal raised when the section is granted.
    grant: Option<oneshot::Sender<()>>,
}

/// One replica's view of the Ricart-Agrawala protocol.
///
/// Priority between competing requests is the lexicographic order of
/// `(timestamp, node id)`; lower wins. A node replies to a REQUEST
/// immediately unless it has a better outstanding claim, in which case the
/// reply is deferred until it leaves the section.
pub struct RaNode {
    id: String,
    /// Every other member of the group; never contains our own id.
    peers: Vec<String>,
    clock: Arc<LamportClock>,
    transport: Arc<dyn MessageTransport>,
    inner: Mutex<NodeInner>,
}

impl RaNode {
    /// `peers` may repeat ids or include the node's own; both are dropped.
    pub fn new(
        id: impl Into<String>,
        peers: Vec<String>,
        clock: Arc<LamportClock>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        let id = id.into();
        let mut peers: Vec<String> = peers.into_iter().filter(|peer| *peer != id).collect();
        peers.sort();
        peers.dedup();

        Self {
            id,
            peers,
            clock,
            transport,
            inner: Mutex::new(NodeInner {
                state: NodeState::Released,
                request_ts: 0,
                replies_needed: HashSet::new(),
                deferred_replies: Vec::new(),
                grant: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub async fn state(&self) -> NodeState {
        self.inner.lock().await.state
    }

    /// Block until this node holds the critical section.
    ///
    /// Broadcasts a timestamped REQUEST to every peer and waits for the full
    /// set of REPLYs. The wait is unbounded; callers that need a deadline
    /// wrap this in a timeout and call [`cancel_request_cs`] on expiry.
    ///
    /// [`cancel_request_cs`]: RaNode::cancel_request_cs
    pub async fn request_cs(&self) {
        let (request_ts, granted) = {
            let mut inner = self.inner.lock().await;
            inner.state = NodeState::Wanted;
            inner.request_ts = self.clock.tick();
            inner.replies_needed = self.peers.iter().cloned().collect();

            // Alone in the group: nobody to ask.
            if self.peers.is_empty() {
                Self::enter_cs(&mut inner, &self.id);
                return;
            }

            let (tx, rx) = oneshot::channel();
            inner.grant = Some(tx);
            (inner.request_ts, rx)
        };

        let msg = PeerMessage {
            kind: MessageKind::Request,
            timestamp: request_ts,
            node_id: self.id.clone(),
        };
        info!(
            "[{}] Requesting critical section (ts: {})",
            self.id, request_ts
        );
        for peer in &self.peers {
            self.dispatch(peer, msg.clone());
        }

        // Resolves when the last REPLY lands, or errs if the request was
        // cancelled; either way the wait is over.
        let _ = granted.await;
    }

    /// Leave the critical section and flush every deferred REPLY, in the
    /// order the REQUESTs arrived.
    pub async fn release_cs(&self) {
        let deferred = {
            let mut inner = self.inner.lock().await;
            inner.state = NodeState::Released;
            std::mem::take(&mut inner.deferred_replies)
        };

        info!(
            "[{}] Released critical section ({} deferred replies)",
            self.id,
            deferred.len()
        );
        for peer in deferred {
            self.send_reply(&peer);
        }
    }

    /// Abandon a pending request, e.g. on a caller-side deadline.
    ///
    /// Only effective while `Wanted`; returns `false` if the grant already
    /// landed (the caller then owns the section and must release it).
    /// Deferred replies are kept for the next release.
    pub async fn cancel_request_cs(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != NodeState::Wanted {
            return false;
        }

        info!("[{}] Cancelling pending critical-section request", self.id);
        inner.state = NodeState::Released;
        inner.replies_needed.clear();
        inner.grant = None;
        if !inner.deferred_replies.is_empty() {
            // Unreachable while our own request was outstanding, but a peer
            // must never be stranded: the next release flushes these.
            warn!(
                "[{}] Cancelled with {} deferred replies pending",
                self.id,
                inner.deferred_replies.len()
            );
        }
        true
    }

    /// Entry point for everything arriving on `/internal/message`.
    pub async fn handle_message(&self, msg: PeerMessage) {
        // Lamport rule: fold the sender's timestamp in exactly once,
        // whatever the message turns out to be.
        self.clock.witness(msg.timestamp);

        if msg.node_id == self.id {
            debug!("[{}] Discarding self-addressed message", self.id);
            return;
        }

        match msg.kind {
            MessageKind::Request => self.handle_request(msg).await,
            MessageKind::Reply => self.handle_reply(msg).await,
        }
    }

    async fn handle_request(&self, msg: PeerMessage) {
        let mut inner = self.inner.lock().await;

        let reply_now = match inner.state {
            NodeState::Released => true,
            // Yield only to a strictly better claim; ties go to the lower id.
            NodeState::Wanted | NodeState::Held => {
                (msg.timestamp, msg.node_id.as_str()) < (inner.request_ts, self.id.as_str())
            }
        };

        if reply_now {
            debug!("[{}] Replying to {} immediately", self.id, msg.node_id);
            self.send_reply(&msg.node_id);
        } else {
            debug!(
                "[{}] Deferring reply to {} (state: {}, ts: {} vs {})",
                self.id, msg.node_id, inner.state, msg.timestamp, inner.request_ts
            );
            inner.deferred_replies.push(msg.node_id);
        }
    }

    async fn handle_reply(&self, msg: PeerMessage) {
        let mut inner = self.inner.lock().await;

        if inner.state != NodeState::Wanted {
            // A cancelled request can leave replies in flight.
            debug!(
                "[{}] Ignoring REPLY from {} while {}",
                self.id, msg.node_id, inner.state
            );
            return;
        }

        inner.replies_needed.remove(&msg.node_id);
        debug!(
            "[{}] Got reply from {} ({} outstanding)",
            self.id,
            msg.node_id,
            inner.replies_needed.len()
        );
        if inner.replies_needed.is_empty() {
            Self::enter_cs(&mut inner, &self.id);
        }
    }

    /// Transition to Held and raise the grant signal exactly once.
    /// Callers hold the inner lock.
    fn enter_cs(inner: &mut NodeInner, id: &str) {
        if inner.state == NodeState::Wanted {
            info!("[{}] Entering critical section", id);
            inner.state = NodeState::Held;
            if let Some(grant) = inner.grant.take() {
                let _ = grant.send(());
            }
        }
    }

    fn send_reply(&self, to: &str) {
        let msg = PeerMessage {
            kind: MessageKind::Reply,
            timestamp: self.clock.tick(),
            node_id: self.id.clone(),
        };
        self.dispatch(to, msg);
    }

    /// Hand a message to the transport on its own task; delivery failures
    /// are logged, never propagated into the protocol.
    fn dispatch(&self, to: &str, msg: PeerMessage) {
        let transport = self.transport.clone();
        let from = self.id.clone();
        let to = to.to_string();
        tokio::spawn(async move {
            if let Err(e) = transport.send(&to, &msg).await {
                warn!("[{}] Could not deliver {:?} to {}: {}", from, msg.kind, to, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    /// Records every send in an unbounded channel; tests deliver by hand.
    struct TestTransport {
        outbox: mpsc::UnboundedSender<(String, PeerMessage)>,
    }

    #[async_trait]
    impl MessageTransport for TestTransport {
        async fn send(&self, peer_id: &str, msg: &PeerMessage) -> anyhow::Result<()> {
            self.outbox.send((peer_id.to_string(), msg.clone())).ok();
            Ok(())
        }
    }

    type Outbox = mpsc::UnboundedReceiver<(String, PeerMessage)>;

    fn make_node(id: &str, peers: &[&str]) -> (Arc<RaNode>, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let node = Arc::new(RaNode::new(
            id,
            peers.iter().map(|p| p.to_string()).collect(),
            Arc::new(LamportClock::new()),
            Arc::new(TestTransport { outbox: tx }),
        ));
        (node, rx)
    }

    fn request(ts: u64, from: &str) -> PeerMessage {
        PeerMessage {
            kind: MessageKind::Request,
            timestamp: ts,
            node_id: from.to_string(),
        }
    }

    fn reply(ts: u64, from: &str) -> PeerMessage {
        PeerMessage {
            kind: MessageKind::Reply,
            timestamp: ts,
            node_id: from.to_string(),
        }
    }

    /// Wait out any spawned send tasks, then drain the outbox.
    async fn drain(outbox: &mut Outbox) -> Vec<(String, PeerMessage)> {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        let mut out = Vec::new();
        while let Ok(entry) = outbox.try_recv() {
            out.push(entry);
        }
        out
    }

    #[tokio::test]
    async fn enters_directly_with_no_peers() {
        let (node, mut outbox) = make_node("server1", &[]);

        node.request_cs().await;
        assert_eq!(node.state().await, NodeState::Held);
        assert!(drain(&mut outbox).await.is_empty());

        node.release_cs().await;
        assert_eq!(node.state().await, NodeState::Released);
    }

    #[tokio::test]
    async fn constructor_filters_self_and_duplicates() {
        let (node, _outbox) = make_node("server1", &["server2", "server1", "server2", "server3"]);
        assert_eq!(node.peers(), ["server2", "server3"]);
    }

    #[tokio::test]
    async fn enters_after_all_replies() {
        let (node, mut outbox) = make_node("server1", &["server2", "server3"]);

        let requester = {
            let node = node.clone();
            tokio::spawn(async move { node.request_cs().await })
        };

        let sent = drain(&mut outbox).await;
        assert_eq!(sent.len(), 2);
        for (_, msg) in &sent {
            assert_eq!(msg.kind, MessageKind::Request);
            assert_eq!(msg.timestamp, 1);
        }

        node.handle_message(reply(2, "server2")).await;
        assert_eq!(node.state().await, NodeState::Wanted);

        node.handle_message(reply(2, "server3")).await;
        assert_eq!(node.state().await, NodeState::Held);
        requester.await.unwrap();
    }

    #[tokio::test]
    async fn tie_breaks_by_node_id() {
        let (node, mut outbox) = make_node("server2", &["server1", "server3"]);

        let requester = {
            let node = node.clone();
            tokio::spawn(async move { node.request_cs().await })
        };
        drain(&mut outbox).await;

        // Same timestamp, lower id: server1 outranks us and is answered now.
        node.handle_message(request(1, "server1")).await;
        let sent = drain(&mut outbox).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "server1");
        assert_eq!(sent[0].1.kind, MessageKind::Reply);

        // Same timestamp, higher id: server3 waits for our release.
        node.handle_message(request(1, "server3")).await;
        assert!(drain(&mut outbox).await.is_empty());

        node.handle_message(reply(3, "server1")).await;
        node.handle_message(reply(3, "server3")).await;
        requester.await.unwrap();
        assert_eq!(node.state().await, NodeState::Held);

        // Exactly one REPLY per deferred REQUEST, flushed at release.
        node.release_cs().await;
        let sent = drain(&mut outbox).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "server3");
        assert_eq!(sent[0].1.kind, MessageKind::Reply);
    }

    #[tokio::test]
    async fn defers_every_request_while_holding() {
        let (node, mut outbox) = make_node("server1", &[]);
        node.request_cs().await;
        assert_eq!(node.state().await, NodeState::Held);

        node.handle_message(request(10, "server2")).await;
        assert!(drain(&mut outbox).await.is_empty());

        node.release_cs().await;
        let sent = drain(&mut outbox).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "server2");
    }

    #[tokio::test]
    async fn reply_while_released_is_ignored() {
        let (node, mut outbox) = make_node("server1", &["server2"]);

        node.handle_message(reply(5, "server2")).await;
        assert_eq!(node.state().await, NodeState::Released);
        assert!(drain(&mut outbox).await.is_empty());
    }

    #[tokio::test]
    async fn self_addressed_request_is_discarded_after_witness() {
        let (node, mut outbox) = make_node("server1", &["server2"]);

        node.handle_message(request(7, "server1")).await;
        assert_eq!(node.state().await, NodeState::Released);
        assert!(drain(&mut outbox).await.is_empty());

        // The timestamp was still witnessed before the discard.
        node.release_cs().await;
        assert!(drain(&mut outbox).await.is_empty());
    }

    #[tokio::test]
    async fn cancel_abandons_a_pending_request() {
        let (node, mut outbox) = make_node("server1", &["server2"]);

        let requester = {
            let node = node.clone();
            tokio::spawn(async move { node.request_cs().await })
        };
        drain(&mut outbox).await;

        assert!(node.cancel_request_cs().await);
        assert_eq!(node.state().await, NodeState::Released);
        // Dropping the grant sender unblocks the abandoned wait.
        requester.await.unwrap();

        // The late REPLY from the peer changes nothing.
        node.handle_message(reply(4, "server2")).await;
        assert_eq!(node.state().await, NodeState::Released);
    }

    #[tokio::test]
    async fn cancel_reports_false_outside_wanted() {
        let (node, _outbox) = make_node("server1", &[]);
        assert!(!node.cancel_request_cs().await);

        node.request_cs().await;
        assert_eq!(node.state().await, NodeState::Held);
        assert!(!node.cancel_request_cs().await);
        assert_eq!(node.state().await, NodeState::Held);
    }

    /// Deliver queued messages between nodes until the group goes quiet.
    async fn pump(nodes: &HashMap<String, Arc<RaNode>>, outboxes: &mut [Outbox]) {
        loop {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            let mut delivered = false;
            for outbox in outboxes.iter_mut() {
                while let Ok((to, msg)) = outbox.try_recv() {
                    if let Some(node) = nodes.get(&to) {
                        node.handle_message(msg).await;
                    }
                    delivered = true;
                }
            }
            if !delivered {
                break;
            }
        }
    }

    #[tokio::test]
    async fn three_node_race_enters_in_priority_order() {
        let ids = ["server1", "server2", "server3"];
        let mut nodes = HashMap::new();
        let mut outboxes = Vec::new();
        for id in ids {
            let peers: Vec<&str> = ids.iter().filter(|p| **p != id).copied().collect();
            let (node, outbox) = make_node(id, &peers);
            nodes.insert(id.to_string(), node);
            outboxes.push(outbox);
        }

        // All three request before any message is delivered, so every
        // request carries timestamp 1 and ids break the ties.
        let mut requesters = Vec::new();
        for id in ids {
            let node = nodes[id].clone();
            requesters.push(tokio::spawn(async move { node.request_cs().await }));
        }

        pump(&nodes, &mut outboxes).await;
        assert_eq!(nodes["server1"].state().await, NodeState::Held);
        assert_eq!(nodes["server2"].state().await, NodeState::Wanted);
        assert_eq!(nodes["server3"].state().await, NodeState::Wanted);

        nodes["server1"].release_cs().await;
        pump(&nodes, &mut outboxes).await;
        assert_eq!(nodes["server1"].state().await, NodeState::Released);
        assert_eq!(nodes["server2"].state().await, NodeState::Held);
        assert_eq!(nodes["server3"].state().await, NodeState::Wanted);

        nodes["server2"].release_cs().await;
        pump(&nodes, &mut outboxes).await;
        assert_eq!(nodes["server3"].state().await, NodeState::Held);

        nodes["server3"].release_cs().await;
        pump(&nodes, &mut outboxes).await;
        for id in ids {
            assert_eq!(nodes[id].state().await, NodeState::Released);
        }
        for requester in requesters {
            requester.await.unwrap();
        }
    }
}
