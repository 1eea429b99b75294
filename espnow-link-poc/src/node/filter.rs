//! Admission control for every raw buffer the radio hands us.
//!
//! Checks run in a fixed order and short-circuit on the first failure:
//! length, origin, decode, duplicate, group. A failure is a silent drop plus
//! a log event, never a fatal condition.

use log::{debug, info, warn};

use crate::device::frame::{FrameError, Packet, PACKET_LEN};
use crate::device::peer::PeerTable;
use crate::device::RxMetadata;
use crate::{format_mac, MacAddress};

/// A frame that passed every admission check, ready for dispatch.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub packet: Packet,
    pub sender: MacAddress,
    pub metadata: RxMetadata,
}

/// Why a frame was dropped. Consumed by observability only; none of these
/// conditions is an error for the node itself.
#[derive(thiserror::Error, Debug)]
pub enum RejectReason {
    #[error("Malformed packet (is: {}B, need: {}B)!", .length, .expected)]
    MalformedPacket { length: usize, expected: usize },

    #[error("Sender {} is not whitelisted!", format_mac(.sender))]
    UnauthorizedSender { sender: MacAddress },

    #[error("Duplicate ignored (seq {} <= {}).", .sequence, .watermark)]
    DuplicateMessage { sequence: u32, watermark: u32 },

    #[error("Message for group {} (not for me).", .group)]
    NotForMyGroup { group: u8 },
}

/// Per-node admission gate.
///
/// Owns the duplicate watermark: the highest sequence number accepted so
/// far, one scalar for the whole node. With several senders interleaving on
/// one receiver the scheme drops legitimate messages whose sequence trails
/// another sender's; keyed per-sender suppression is deliberately not done
/// here, matching the deployed nodes this has to stay compatible with.
#[derive(Debug)]
pub struct InboundFilter {
    my_group: u8,
    require_known_sender: bool,
    last_sequence: u32,
}

impl InboundFilter {
    pub fn new(my_group: u8, require_known_sender: bool) -> Self {
        Self {
            my_group,
            require_known_sender,
            last_sequence: 0,
        }
    }

    pub fn my_group(&self) -> u8 {
        self.my_group
    }

    /// Highest sequence number accepted so far, 0 before any acceptance.
    pub fn last_sequence(&self) -> u32 {
        self.last_sequence
    }

    /// Check-then-set on the watermark. Rejecting leaves it unchanged.
    pub fn admit(&mut self, sequence: u32) -> bool {
        if sequence <= self.last_sequence {
            return false;
        }
        self.last_sequence = sequence;
        true
    }

    /// Run the whole admission pipeline on one received buffer.
    pub fn inspect(
        &mut self,
        sender: MacAddress,
        frame: &[u8],
        metadata: RxMetadata,
        peers: &PeerTable,
    ) -> Result<Accepted, RejectReason> {
        if frame.len() < PACKET_LEN {
            let reason = RejectReason::MalformedPacket {
                length: frame.len(),
                expected: PACKET_LEN,
            };
            warn!("{}", reason);
            return Err(reason);
        }

        // Unknown origins are turned away before we even look at the bytes.
        if self.require_known_sender && !peers.contains(&sender) {
            let reason = RejectReason::UnauthorizedSender { sender };
            warn!("{}", reason);
            return Err(reason);
        }

        let packet = match Packet::try_from_bytes(frame) {
            Ok(packet) => packet,
            Err(FrameError::TooShort { length, expected }) => {
                let reason = RejectReason::MalformedPacket { length, expected };
                warn!("{}", reason);
                return Err(reason);
            }
        };

        if !self.admit(packet.sequence) {
            let reason = RejectReason::DuplicateMessage {
                sequence: packet.sequence,
                watermark: self.last_sequence,
            };
            warn!("{}", reason);
            return Err(reason);
        }

        // Group mismatch is checked after the watermark moved: the message
        // is recognized, just not addressed to us.
        if packet.group != 0 && packet.group != self.my_group {
            let reason = RejectReason::NotForMyGroup {
                group: packet.group,
            };
            info!("{}", reason);
            return Err(reason);
        }

        debug!(
            "From {} len={} ch={:?} rssi={:?}",
            format_mac(&sender),
            frame.len(),
            metadata.channel,
            metadata.rssi,
        );
        Ok(Accepted {
            packet,
            sender,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::frame::MessageKind;

    const SENDER: MacAddress = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC];

    fn frame(group: u8, sequence: u32) -> Vec<u8> {
        Packet {
            sender_id: "BROADCASTER".to_owned(),
            body: "hello".to_owned(),
            kind: MessageKind::Info,
            group,
            sequence,
            timestamp: 0,
        }
        .to_bytes()
    }

    fn open_filter() -> InboundFilter {
        InboundFilter::new(2, false)
    }

    #[test]
    fn admits_strictly_increasing_sequences() {
        let mut filter = open_filter();
        for sequence in [1, 2, 5, 90, 91] {
            assert!(filter.admit(sequence));
        }
        assert_eq!(filter.last_sequence(), 91);
    }

    #[test]
    fn rejects_stale_sequences_and_keeps_watermark() {
        let mut filter = open_filter();
        assert!(filter.admit(10));
        for sequence in [10, 9, 1, 0] {
            assert!(!filter.admit(sequence));
            assert_eq!(filter.last_sequence(), 10);
        }
    }

    #[test]
    fn short_buffer_is_malformed() {
        let mut filter = open_filter();
        let peers = PeerTable::new();
        let buffer = frame(0, 1);
        let verdict = filter.inspect(SENDER, &buffer[..40], RxMetadata::default(), &peers);
        assert!(matches!(
            verdict,
            Err(RejectReason::MalformedPacket { length: 40, .. })
        ));
        assert_eq!(filter.last_sequence(), 0);
    }

    #[test]
    fn unknown_sender_is_rejected_before_decode() {
        let mut filter = InboundFilter::new(2, true);
        let peers = PeerTable::new();
        let verdict = filter.inspect(SENDER, &frame(0, 7), RxMetadata::default(), &peers);
        assert!(matches!(
            verdict,
            Err(RejectReason::UnauthorizedSender { sender }) if sender == SENDER
        ));
        // Rejected before the duplicate check, the watermark never moved.
        assert_eq!(filter.last_sequence(), 0);
    }

    #[test]
    fn whitelisted_sender_passes() {
        let mut filter = InboundFilter::new(2, true);
        let mut peers = PeerTable::new();
        peers.add(SENDER, 0, false);
        let verdict = filter.inspect(SENDER, &frame(0, 7), RxMetadata::default(), &peers);
        assert!(verdict.is_ok());
    }

    #[test]
    fn duplicate_delivery_is_dropped_once_accepted() {
        let mut filter = open_filter();
        let peers = PeerTable::new();
        let buffer = frame(0, 5);
        assert!(filter
            .inspect(SENDER, &buffer, RxMetadata::default(), &peers)
            .is_ok());
        let verdict = filter.inspect(SENDER, &buffer, RxMetadata::default(), &peers);
        assert!(matches!(
            verdict,
            Err(RejectReason::DuplicateMessage {
                sequence: 5,
                watermark: 5,
            })
        ));
    }

    #[test]
    fn group_zero_reaches_any_node() {
        let mut filter = open_filter();
        let peers = PeerTable::new();
        assert!(filter
            .inspect(SENDER, &frame(0, 1), RxMetadata::default(), &peers)
            .is_ok());
    }

    #[test]
    fn matching_group_is_accepted() {
        let mut filter = open_filter();
        let peers = PeerTable::new();
        assert!(filter
            .inspect(SENDER, &frame(2, 1), RxMetadata::default(), &peers)
            .is_ok());
    }

    #[test]
    fn foreign_group_is_dropped_but_advances_watermark() {
        let mut filter = InboundFilter::new(1, false);
        let peers = PeerTable::new();
        let verdict = filter.inspect(SENDER, &frame(2, 10), RxMetadata::default(), &peers);
        assert!(matches!(
            verdict,
            Err(RejectReason::NotForMyGroup { group: 2 })
        ));
        assert_eq!(filter.last_sequence(), 10);
    }

    #[test]
    fn accepted_carries_sender_and_metadata() {
        let mut filter = open_filter();
        let peers = PeerTable::new();
        let metadata = RxMetadata {
            channel: Some(1),
            rssi: Some(-61),
        };
        let accepted = filter
            .inspect(SENDER, &frame(2, 3), metadata, &peers)
            .expect("should pass");
        assert_eq!(accepted.sender, SENDER);
        assert_eq!(accepted.metadata, metadata);
        assert_eq!(accepted.packet.sequence, 3);
    }
}
