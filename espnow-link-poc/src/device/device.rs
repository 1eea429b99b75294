use std::fmt::Debug;

use crate::device::peer::PeerStatus;
use crate::MacAddress;

/// Reception metadata reported by the radio driver alongside a frame.
///
/// Both fields are best-effort: drivers that do not expose the receive
/// control block leave them unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxMetadata {
    /// Radio channel the frame arrived on.
    pub channel: Option<u8>,
    /// Received signal strength indication, in dBm.
    pub rssi: Option<i16>,
}

/// Delivery report for a one-shot transmission, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failure,
}

/// Client notified when a transmission has been handed to the air.
pub trait TxClient: Send {
    fn send_done(&self, target: MacAddress, status: TxStatus) -> Result<(), ()>;
}

/// Client notified for every inbound frame.
pub trait RxClient: Send {
    fn receive(&self, sender: MacAddress, frame: Vec<u8>, metadata: RxMetadata) -> Result<(), ()>;
}

/// Connectionless datagram transport bound to one radio interface.
///
/// Frames are carried unmodified; there is no connection state and no
/// delivery guarantee beyond the driver's own link-level retries. A target
/// must be registered before transmission, registration is idempotent.
pub trait Transport {
    type TransportError: Debug;

    /// Hardware address of the local interface.
    fn local_address(&self) -> MacAddress;

    /// Register a peer with its transmission parameters. Registering a known
    /// address again is not an error.
    fn register_peer(
        &mut self,
        address: MacAddress,
        channel: u8,
        encrypt: bool,
    ) -> Result<PeerStatus, Self::TransportError>;

    /// Hand one raw frame to the driver for the given target. One-shot fire,
    /// the outcome is reported through the [TxClient] if one is set.
    fn send(&mut self, target: MacAddress, frame: &[u8]) -> Result<(), Self::TransportError>;

    fn set_receive_client(&mut self, client: Box<dyn RxClient>);
    fn set_transmit_client(&mut self, client: Box<dyn TxClient>);

    /// Drive callback delivery. Returns whether at least one inbound frame
    /// was handed to the [RxClient].
    fn poll(&mut self) -> Result<bool, Self::TransportError>;
}
