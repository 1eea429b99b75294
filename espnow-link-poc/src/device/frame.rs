//! Fixed-layout wire format shared by every node.
//!
//! The packet is packed field by field, never through the in-memory layout,
//! so two builds always agree on the encoded bytes. Integers travel
//! little-endian, text fields are NUL-padded to their bound.

use std::fmt;

/// Bound of the originating node identity, in bytes.
pub const SENDER_ID_LEN: usize = 20;
/// Bound of the free-text payload, in bytes.
pub const BODY_LEN: usize = 180;

const KIND_OFFSET: usize = SENDER_ID_LEN + BODY_LEN;
const GROUP_OFFSET: usize = KIND_OFFSET + 1;
const SEQUENCE_OFFSET: usize = GROUP_OFFSET + 1;
const TIMESTAMP_OFFSET: usize = SEQUENCE_OFFSET + 4;

/// Encoded packet size. Anything shorter on the air is discarded.
pub const PACKET_LEN: usize = TIMESTAMP_OFFSET + 4;

/// Tag carried by every packet, telling receivers how to react.
///
/// Unknown tags survive a decode/encode cycle untouched so that newer nodes
/// can speak through older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Command,
    Alert,
    Unknown(u8),
}

impl MessageKind {
    pub fn to_wire(self) -> u8 {
        match self {
            MessageKind::Info => 1,
            MessageKind::Command => 2,
            MessageKind::Alert => 3,
            MessageKind::Unknown(tag) => tag,
        }
    }

    pub fn from_wire(tag: u8) -> Self {
        match tag {
            1 => MessageKind::Info,
            2 => MessageKind::Command,
            3 => MessageKind::Alert,
            tag => MessageKind::Unknown(tag),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Info => write!(f, "INFO"),
            MessageKind::Command => write!(f, "COMMAND"),
            MessageKind::Alert => write!(f, "ALERT"),
            MessageKind::Unknown(tag) => write!(f, "UNKNOWN({})", tag),
        }
    }
}

/// One protocol message, the unit of exchange between nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Text identity of the originating node, not its hardware address.
    pub sender_id: String,
    /// Free-text payload.
    pub body: String,
    pub kind: MessageKind,
    /// Addressing scope: 0 targets every group, any other value targets
    /// exactly the nodes configured with it.
    pub group: u8,
    /// Sender-assigned counter used by receivers to drop replays. Not
    /// required to be gap-free. Replies carry 0.
    pub sequence: u32,
    /// Sender-local uptime in milliseconds at creation. Informational only,
    /// clocks are not synchronized across nodes.
    pub timestamp: u32,
}

impl Packet {
    /// Encode into exactly [PACKET_LEN] bytes. Text fields longer than their
    /// bound are truncated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; PACKET_LEN];
        write_text(&mut bytes[..SENDER_ID_LEN], &self.sender_id);
        write_text(&mut bytes[SENDER_ID_LEN..KIND_OFFSET], &self.body);
        bytes[KIND_OFFSET] = self.kind.to_wire();
        bytes[GROUP_OFFSET] = self.group;
        bytes[SEQUENCE_OFFSET..TIMESTAMP_OFFSET].copy_from_slice(&self.sequence.to_le_bytes());
        bytes[TIMESTAMP_OFFSET..PACKET_LEN].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Decode from a raw buffer. Total and side-effect-free: either the
    /// buffer holds [PACKET_LEN] bytes and a packet value comes back, or the
    /// length is rejected. Semantic checks belong to the inbound filter.
    ///
    /// Trailing bytes beyond [PACKET_LEN] are ignored. Text fields are
    /// terminated here, whatever the sender put on the air.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < PACKET_LEN {
            return Err(FrameError::TooShort {
                length: bytes.len(),
                expected: PACKET_LEN,
            });
        }
        let mut sequence_raw = [0u8; 4];
        sequence_raw.copy_from_slice(&bytes[SEQUENCE_OFFSET..TIMESTAMP_OFFSET]);
        let mut timestamp_raw = [0u8; 4];
        timestamp_raw.copy_from_slice(&bytes[TIMESTAMP_OFFSET..PACKET_LEN]);
        Ok(Packet {
            sender_id: read_text(&bytes[..SENDER_ID_LEN]),
            body: read_text(&bytes[SENDER_ID_LEN..KIND_OFFSET]),
            kind: MessageKind::from_wire(bytes[KIND_OFFSET]),
            group: bytes[GROUP_OFFSET],
            sequence: u32::from_le_bytes(sequence_raw),
            timestamp: u32::from_le_bytes(timestamp_raw),
        })
    }
}

fn write_text(slot: &mut [u8], text: &str) {
    let raw = text.as_bytes();
    let len = raw.len().min(slot.len());
    slot[..len].copy_from_slice(&raw[..len]);
}

fn read_text(slot: &[u8]) -> String {
    let end = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Frame is too short to carry a packet (is: {}B, need: {}B)!", .length, .expected)]
    TooShort { length: usize, expected: usize },
}
