//! Dispatch of accepted messages to their reaction.

use log::{debug, info, warn};

use crate::device::frame::{MessageKind, Packet};
use crate::node::filter::Accepted;
use crate::{format_mac, MacAddress};

/// Acknowledgment body sent back for every processed command.
pub const COMMAND_ACK_BODY: &str = "Command received and processed";

/// Application-defined reactions, the seam between the protocol and whatever
/// the node actually does. Both hooks default to doing nothing.
pub trait NodeHooks {
    fn on_command(&mut self, _packet: &Packet) {}
    fn on_alert(&mut self, _packet: &Packet) {}
}

/// Hook set for nodes that only observe.
#[derive(Debug, Default)]
pub struct NoHooks;

impl NodeHooks for NoHooks {}

/// An outbound send requested by the router, performed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub target: MacAddress,
    pub packet: Packet,
}

/// How a node reacts to accepted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPolicy {
    /// Group-aware reaction on the message kind; commands are acknowledged.
    Dispatch,
    /// Mirror every accepted message straight back to its sender. No group
    /// or kind semantics, kept as its own mode rather than folded into
    /// [RouterPolicy::Dispatch].
    Echo,
}

#[derive(Debug)]
pub struct Router {
    node_id: String,
    my_group: u8,
    policy: RouterPolicy,
}

impl Router {
    pub fn new(node_id: String, my_group: u8, policy: RouterPolicy) -> Self {
        Self {
            node_id,
            my_group,
            policy,
        }
    }

    pub fn policy(&self) -> RouterPolicy {
        self.policy
    }

    /// React to one accepted message. Pure dispatch: any send it wants comes
    /// back as a [Reply] for the caller to fire.
    pub fn dispatch(
        &self,
        accepted: &Accepted,
        hooks: &mut dyn NodeHooks,
        now_ms: u32,
    ) -> Option<Reply> {
        let packet = &accepted.packet;
        info!(
            "From {} / {}: [{}] group={} seq={} \"{}\"",
            format_mac(&accepted.sender),
            packet.sender_id,
            packet.kind,
            packet.group,
            packet.sequence,
            packet.body,
        );
        match self.policy {
            RouterPolicy::Echo => Some(self.echo_reply(accepted, now_ms)),
            RouterPolicy::Dispatch => match packet.kind {
                MessageKind::Info => None,
                MessageKind::Command => {
                    info!("Processing command...");
                    hooks.on_command(packet);
                    Some(self.command_ack(accepted, now_ms))
                }
                MessageKind::Alert => {
                    warn!("ALERT: {}", packet.body);
                    hooks.on_alert(packet);
                    None
                }
                MessageKind::Unknown(tag) => {
                    // Valid but unhandled, newer nodes may speak kinds we
                    // don't know yet.
                    debug!("Unhandled message kind {}, ignored.", tag);
                    None
                }
            },
        }
    }

    /// Acknowledgment for a processed command. Sequence 0 keeps the reply
    /// out of the peer's duplicate accounting if it ever loops back.
    fn command_ack(&self, accepted: &Accepted, now_ms: u32) -> Reply {
        Reply {
            target: accepted.sender,
            packet: Packet {
                sender_id: self.node_id.clone(),
                body: COMMAND_ACK_BODY.to_owned(),
                kind: MessageKind::Info,
                group: self.my_group,
                sequence: 0,
                timestamp: now_ms,
            },
        }
    }

    /// Echo mode mirrors the incoming counter, both in the body and as the
    /// reply's own sequence; it is never incremented independently.
    fn echo_reply(&self, accepted: &Accepted, now_ms: u32) -> Reply {
        Reply {
            target: accepted.sender,
            packet: Packet {
                sender_id: self.node_id.clone(),
                body: format!("Reply to #{} - Thanks!", accepted.packet.sequence),
                kind: MessageKind::Info,
                group: 0,
                sequence: accepted.packet.sequence,
                timestamp: now_ms,
            },
        }
    }
}
