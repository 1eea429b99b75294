//! In-process stand-in for the radio: every endpoint shares one "air" and
//! frames cross between threads over channels. Good enough to run the whole
//! protocol on a workstation.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};

use log::warn;

use espnow_link_poc::device::peer::PeerStatus;
use espnow_link_poc::device::{RxClient, RxMetadata, Transport, TxClient, TxStatus};
use espnow_link_poc::{format_mac, MacAddress, BROADCAST_ADDRESS};

const INBOX_DEPTH: usize = 32;
/// Channel every loopback frame pretends to arrive on.
const AIR_CHANNEL: u8 = 1;
/// Signal strength every loopback frame pretends to arrive with.
const AIR_RSSI: i16 = -42;

type Inbox = SyncSender<(MacAddress, Vec<u8>)>;

/// The shared medium connecting every [LoopbackRadio] spawned from it.
#[derive(Clone, Default)]
pub struct Airwaves {
    stations: Arc<Mutex<HashMap<MacAddress, Inbox>>>,
}

impl Airwaves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new interface with the given hardware address.
    pub fn endpoint(&self, address: MacAddress) -> LoopbackRadio {
        let (inbox, frames) = sync_channel(INBOX_DEPTH);
        self.stations
            .lock()
            .expect("airwaves poisoned")
            .insert(address, inbox);
        LoopbackRadio {
            address,
            stations: Arc::clone(&self.stations),
            frames,
            peers: HashMap::new(),
            rx_client: None,
            tx_client: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoopbackError {
    #[error("Airwaves are gone, every other endpoint hung up!")]
    Disconnected,
}

/// One endpoint on the shared air.
pub struct LoopbackRadio {
    address: MacAddress,
    stations: Arc<Mutex<HashMap<MacAddress, Inbox>>>,
    frames: Receiver<(MacAddress, Vec<u8>)>,
    peers: HashMap<MacAddress, (u8, bool)>,
    rx_client: Option<Box<dyn RxClient>>,
    tx_client: Option<Box<dyn TxClient>>,
}

impl LoopbackRadio {
    fn deliver(&self, target: &MacAddress, frame: &[u8]) -> bool {
        let stations = self.stations.lock().expect("airwaves poisoned");
        match stations.get(target) {
            // A full inbox drops the frame, like any radio under pressure.
            Some(inbox) => inbox.try_send((self.address, frame.to_vec())).is_ok(),
            None => false,
        }
    }
}

impl Transport for LoopbackRadio {
    type TransportError = LoopbackError;

    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn register_peer(
        &mut self,
        address: MacAddress,
        channel: u8,
        encrypt: bool,
    ) -> Result<PeerStatus, Self::TransportError> {
        if self.peers.contains_key(&address) {
            return Ok(PeerStatus::AlreadyKnown);
        }
        self.peers.insert(address, (channel, encrypt));
        Ok(PeerStatus::Added)
    }

    fn send(&mut self, target: MacAddress, frame: &[u8]) -> Result<(), Self::TransportError> {
        let delivered = if target == BROADCAST_ADDRESS {
            let stations: Vec<(MacAddress, Inbox)> = {
                let guard = self.stations.lock().expect("airwaves poisoned");
                guard
                    .iter()
                    .map(|(address, inbox)| (*address, inbox.clone()))
                    .collect()
            };
            let mut any = false;
            for (address, inbox) in stations {
                if address == self.address {
                    continue;
                }
                any |= inbox.try_send((self.address, frame.to_vec())).is_ok();
            }
            any
        } else {
            self.deliver(&target, frame)
        };

        if !delivered {
            warn!("Nobody heard the frame for {}.", format_mac(&target));
        }
        if let Some(client) = &self.tx_client {
            let status = if delivered {
                TxStatus::Success
            } else {
                TxStatus::Failure
            };
            let _ = client.send_done(target, status);
        }
        Ok(())
    }

    fn set_receive_client(&mut self, client: Box<dyn RxClient>) {
        self.rx_client = Some(client);
    }

    fn set_transmit_client(&mut self, client: Box<dyn TxClient>) {
        self.tx_client = Some(client);
    }

    fn poll(&mut self) -> Result<bool, Self::TransportError> {
        let mut any = false;
        loop {
            match self.frames.try_recv() {
                Ok((sender, frame)) => {
                    any = true;
                    if let Some(client) = &self.rx_client {
                        let metadata = RxMetadata {
                            channel: Some(AIR_CHANNEL),
                            rssi: Some(AIR_RSSI),
                        };
                        let _ = client.receive(sender, frame, metadata);
                    }
                }
                Err(TryRecvError::Empty) => return Ok(any),
                Err(TryRecvError::Disconnected) => return Err(LoopbackError::Disconnected),
            }
        }
    }
}
