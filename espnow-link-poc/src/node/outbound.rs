//! One-shot transmission of a packet to a target address.

use log::{debug, error, info};

use crate::device::frame::Packet;
use crate::device::peer::PeerTable;
use crate::device::Transport;
use crate::{format_mac, MacAddress};

/// Encode `packet` and fire it at `target` with the transmission parameters
/// configured for that peer.
///
/// Unknown targets are allowed, the protocol has no connection setup: they
/// go out on the current channel, unencrypted. Failures are logged and
/// returned, never retried here; retry policy, if any, belongs to whoever
/// schedules the send.
pub fn send_packet<T: Transport>(
    transport: &mut T,
    peers: &PeerTable,
    target: MacAddress,
    packet: &Packet,
) -> Result<(), T::TransportError> {
    let (channel, encrypt) = match peers.lookup(&target) {
        Some(entry) => (entry.channel, entry.encrypt),
        None => {
            debug!(
                "Peer {} is not configured, sending on the current channel unencrypted.",
                format_mac(&target)
            );
            (0, false)
        }
    };
    transport.register_peer(target, channel, encrypt)?;

    info!(
        "Sending [{}] seq={} to {}",
        packet.kind,
        packet.sequence,
        format_mac(&target)
    );
    transport
        .send(target, &packet.to_bytes())
        .map_err(|source| {
            error!("Transmission to {} failed: {:?}", format_mac(&target), source);
            source
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::frame::{MessageKind, PACKET_LEN};
    use crate::device::peer::PeerStatus;
    use crate::device::{RxClient, TxClient};

    const TARGET: MacAddress = [0x9C, 0x9C, 0x1F, 0xD6, 0x8B, 0x34];
    const LOCAL: MacAddress = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC];

    #[derive(Default)]
    struct RecordingTransport {
        registered: Vec<(MacAddress, u8, bool)>,
        sent: Vec<(MacAddress, Vec<u8>)>,
        fail_sends: bool,
    }

    impl Transport for RecordingTransport {
        type TransportError = String;

        fn local_address(&self) -> MacAddress {
            LOCAL
        }

        fn register_peer(
            &mut self,
            address: MacAddress,
            channel: u8,
            encrypt: bool,
        ) -> Result<PeerStatus, Self::TransportError> {
            if self.registered.iter().any(|(a, _, _)| *a == address) {
                return Ok(PeerStatus::AlreadyKnown);
            }
            self.registered.push((address, channel, encrypt));
            Ok(PeerStatus::Added)
        }

        fn send(&mut self, target: MacAddress, frame: &[u8]) -> Result<(), Self::TransportError> {
            if self.fail_sends {
                return Err("air is gone".to_owned());
            }
            self.sent.push((target, frame.to_vec()));
            Ok(())
        }

        fn set_receive_client(&mut self, _client: Box<dyn RxClient>) {}
        fn set_transmit_client(&mut self, _client: Box<dyn TxClient>) {}

        fn poll(&mut self) -> Result<bool, Self::TransportError> {
            Ok(false)
        }
    }

    fn packet() -> Packet {
        Packet {
            sender_id: "BROADCASTER".to_owned(),
            body: "ping".to_owned(),
            kind: MessageKind::Info,
            group: 0,
            sequence: 9,
            timestamp: 100,
        }
    }

    #[test]
    fn resolves_parameters_from_the_peer_table() {
        let mut transport = RecordingTransport::default();
        let mut peers = PeerTable::new();
        peers.add(TARGET, 6, true);
        send_packet(&mut transport, &peers, TARGET, &packet()).expect("send failed");
        assert_eq!(transport.registered, vec![(TARGET, 6, true)]);
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].0, TARGET);
        assert_eq!(transport.sent[0].1.len(), PACKET_LEN);
    }

    #[test]
    fn unknown_peer_falls_back_to_current_channel() {
        let mut transport = RecordingTransport::default();
        let peers = PeerTable::new();
        send_packet(&mut transport, &peers, TARGET, &packet()).expect("send failed");
        assert_eq!(transport.registered, vec![(TARGET, 0, false)]);
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn transport_failure_is_surfaced_not_retried() {
        let mut transport = RecordingTransport {
            fail_sends: true,
            ..Default::default()
        };
        let peers = PeerTable::new();
        let result = send_packet(&mut transport, &peers, TARGET, &packet());
        assert!(result.is_err());
        assert!(transport.sent.is_empty());
    }
}
