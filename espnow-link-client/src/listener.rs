//! Reactive receiver role: sits on the air, lets the node decide what every
//! frame means and fires the replies it asks for.

use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::time::Duration;

use anyhow::bail;
use log::{error, info};

use espnow_link_poc::device::{RxClient, RxMetadata, Transport, TxClient, TxStatus};
use espnow_link_poc::node::router::NodeHooks;
use espnow_link_poc::node::{outbound, LinkNode};
use espnow_link_poc::{format_mac, MacAddress};

pub struct Listener<T: Transport> {
    pub node: LinkNode,
    pub transport: T,
}

impl<T: Transport> Listener<T> {
    pub fn new(node: LinkNode, transport: T) -> Self {
        Self { node, transport }
    }

    /// Run the receive loop forever. Single thread of control: one frame is
    /// fully handled, including its inline reply, before the next one.
    pub fn spawn(&mut self, hooks: &mut dyn NodeHooks) -> anyhow::Result<()> {
        let (events, receiver) = sync_channel(30);
        let handler = RadioHandler { events };
        self.transport.set_receive_client(Box::new(handler.clone()));
        self.transport.set_transmit_client(Box::new(handler));

        info!(
            "Node {} (group {}) listening on {}",
            self.node.node_id(),
            self.node.group(),
            format_mac(&self.transport.local_address()),
        );

        loop {
            if let Err(err) = self.transport.poll() {
                bail!("Fatal error: radio disconnected.\ncauses: {:?}", err);
            }
            match receiver.recv_timeout(Duration::from_millis(500)) {
                Ok(RadioEvent::Frame {
                    sender,
                    frame,
                    metadata,
                }) => {
                    // Rejections were already logged by the filter.
                    if let Ok((_, Some(reply))) =
                        self.node.handle_frame(sender, &frame, metadata, hooks)
                    {
                        if let Err(err) = outbound::send_packet(
                            &mut self.transport,
                            self.node.peers(),
                            reply.target,
                            &reply.packet,
                        ) {
                            error!("Reply not sent: {:?}", err);
                        }
                    }
                }
                Ok(RadioEvent::SendDone { target, status }) => {
                    info!(
                        "Reply to {} -> {}",
                        format_mac(&target),
                        match status {
                            TxStatus::Success => "SUCCESS",
                            TxStatus::Failure => "FAIL",
                        }
                    );
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => bail!("Fatal error: radio disconnected."),
            }
        }
    }
}

enum RadioEvent {
    Frame {
        sender: MacAddress,
        frame: Vec<u8>,
        metadata: RxMetadata,
    },
    SendDone {
        target: MacAddress,
        status: TxStatus,
    },
}

#[derive(Clone)]
struct RadioHandler {
    events: SyncSender<RadioEvent>,
}

impl RxClient for RadioHandler {
    fn receive(&self, sender: MacAddress, frame: Vec<u8>, metadata: RxMetadata) -> Result<(), ()> {
        self.events
            .try_send(RadioEvent::Frame {
                sender,
                frame,
                metadata,
            })
            .map_err(|_| ())
    }
}

impl TxClient for RadioHandler {
    fn send_done(&self, target: MacAddress, status: TxStatus) -> Result<(), ()> {
        self.events
            .try_send(RadioEvent::SendDone { target, status })
            .map_err(|_| ())
    }
}
