//! Per-node protocol logic: admission, dispatch and packet composition,
//! expressed without any transport so it can run against anything that moves
//! raw frames.

pub mod filter;
pub mod outbound;
pub mod router;

use std::time::Instant;

use crate::device::frame::{MessageKind, Packet};
use crate::device::peer::{PeerStatus, PeerTable};
use crate::device::RxMetadata;
use crate::MacAddress;
use self::filter::{Accepted, InboundFilter, RejectReason};
use self::router::{NodeHooks, Reply, Router, RouterPolicy};

/// Static configuration of one node, fixed for its whole lifetime.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Text identity stamped into every outgoing packet.
    pub node_id: String,
    /// Group membership; 0-addressed traffic reaches us regardless.
    pub group: u8,
    pub policy: RouterPolicy,
    /// Turn away senders missing from the peer table, before decoding.
    pub require_known_sender: bool,
    /// Remember any accepted sender as a peer, so replies to arbitrary
    /// talkers resolve their transmission parameters.
    pub auto_add_peers: bool,
}

impl NodeConfig {
    /// Group-aware node reacting on message kinds.
    pub fn dispatch(node_id: &str, group: u8) -> Self {
        Self {
            node_id: node_id.to_owned(),
            group,
            policy: RouterPolicy::Dispatch,
            require_known_sender: false,
            auto_add_peers: false,
        }
    }

    /// Bidirectional node mirroring everything back to whoever talks to it.
    pub fn echo(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_owned(),
            group: 0,
            policy: RouterPolicy::Echo,
            require_known_sender: false,
            auto_add_peers: true,
        }
    }
}

/// One node's view of the link: filter, router, peer table and the
/// sender-side sequence counter.
#[derive(Debug)]
pub struct LinkNode {
    config: NodeConfig,
    filter: InboundFilter,
    router: Router,
    peers: PeerTable,
    next_sequence: u32,
    started: Instant,
}

impl LinkNode {
    pub fn new(config: NodeConfig) -> Self {
        let filter = InboundFilter::new(config.group, config.require_known_sender);
        let router = Router::new(config.node_id.clone(), config.group, config.policy);
        Self {
            config,
            filter,
            router,
            peers: PeerTable::new(),
            next_sequence: 0,
            started: Instant::now(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn group(&self) -> u8 {
        self.config.group
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn add_peer(&mut self, address: MacAddress, channel: u8, encrypt: bool) -> PeerStatus {
        self.peers.add(address, channel, encrypt)
    }

    /// Highest sequence number accepted so far.
    pub fn last_sequence(&self) -> u32 {
        self.filter.last_sequence()
    }

    /// Sender-local monotonic clock, in milliseconds since start-up.
    pub fn uptime_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    /// Complete inbound pipeline for one received buffer: admission, then
    /// dispatch. Returns the accepted message and the reply to fire, if the
    /// router asked for one; the caller performs the actual send.
    pub fn handle_frame(
        &mut self,
        sender: MacAddress,
        frame: &[u8],
        metadata: RxMetadata,
        hooks: &mut dyn NodeHooks,
    ) -> Result<(Accepted, Option<Reply>), RejectReason> {
        let accepted = self.filter.inspect(sender, frame, metadata, &self.peers)?;
        if self.config.auto_add_peers {
            self.peers.add(sender, 0, false);
        }
        let reply = self.router.dispatch(&accepted, hooks, self.uptime_ms());
        Ok((accepted, reply))
    }

    /// Build the next outgoing packet, assigning a fresh sequence number and
    /// a sender-local timestamp. The periodic send path goes through here.
    pub fn compose(&mut self, kind: MessageKind, body: &str, group: u8) -> Packet {
        self.next_sequence += 1;
        Packet {
            sender_id: self.config.node_id.clone(),
            body: body.to_owned(),
            kind,
            group,
            sequence: self.next_sequence,
            timestamp: self.uptime_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::router::NoHooks;

    const SENDER: MacAddress = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC];

    #[test]
    fn compose_assigns_increasing_sequences_from_one() {
        let mut node = LinkNode::new(NodeConfig::dispatch("NODE_G2_001", 2));
        let first = node.compose(MessageKind::Info, "a", 0);
        let second = node.compose(MessageKind::Info, "b", 0);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.sender_id, "NODE_G2_001");
    }

    #[test]
    fn command_frame_yields_an_ack_reply() {
        let mut broadcaster = LinkNode::new(NodeConfig::dispatch("BROADCASTER", 1));
        let mut node = LinkNode::new(NodeConfig::dispatch("NODE_G2_001", 2));
        let frame = broadcaster.compose(MessageKind::Command, "reboot", 0).to_bytes();
        let (accepted, reply) = node
            .handle_frame(SENDER, &frame, RxMetadata::default(), &mut NoHooks)
            .expect("command must pass");
        assert_eq!(accepted.packet.body, "reboot");
        let reply = reply.expect("command must be acknowledged");
        assert_eq!(reply.target, SENDER);
        assert_eq!(reply.packet.sequence, 0);
    }

    #[test]
    fn echo_node_learns_its_talkers() {
        let mut other = LinkNode::new(NodeConfig::dispatch("Device_A", 0));
        let mut node = LinkNode::new(NodeConfig::echo("Device_B"));
        assert!(node.peers().is_empty());
        let frame = other.compose(MessageKind::Info, "hello", 0).to_bytes();
        let (_, reply) = node
            .handle_frame(SENDER, &frame, RxMetadata::default(), &mut NoHooks)
            .expect("echo accepts anything well-formed");
        assert!(node.peers().contains(&SENDER));
        assert!(reply.is_some());
    }

    #[test]
    fn dispatch_node_does_not_learn_talkers() {
        let mut other = LinkNode::new(NodeConfig::dispatch("Device_A", 0));
        let mut node = LinkNode::new(NodeConfig::dispatch("NODE_G2_001", 2));
        let frame = other.compose(MessageKind::Info, "hello", 0).to_bytes();
        node.handle_frame(SENDER, &frame, RxMetadata::default(), &mut NoHooks)
            .expect("well-formed info must pass");
        assert!(node.peers().is_empty());
    }
}
