//! Broadcast role: emits a scheduled message on a fixed interval and listens
//! for whatever comes back.

use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

use anyhow::bail;
use log::{error, info};

use espnow_link_poc::device::frame::MessageKind;
use espnow_link_poc::device::{RxClient, RxMetadata, Transport, TxClient, TxStatus};
use espnow_link_poc::node::router::NoHooks;
use espnow_link_poc::node::{outbound, LinkNode};
use espnow_link_poc::{format_mac, MacAddress, BROADCAST_ADDRESS};

/// One slot of the transmission schedule.
#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    pub kind: MessageKind,
    pub body: String,
    pub group: u8,
}

pub struct Beacon<T: Transport> {
    pub node: LinkNode,
    pub transport: T,
    schedule: Vec<ScheduledMessage>,
    interval: Duration,
}

impl<T: Transport> Beacon<T> {
    pub fn new(
        node: LinkNode,
        transport: T,
        schedule: Vec<ScheduledMessage>,
        interval: Duration,
    ) -> Self {
        Self {
            node,
            transport,
            schedule,
            interval,
        }
    }

    /// Work through the schedule, one message per interval, then return.
    /// Replies arriving in between go through the node like any other frame.
    pub fn spawn(&mut self) -> anyhow::Result<()> {
        let (events, receiver) = sync_channel(30);
        let handler = RadioHandler { events };
        self.transport.set_receive_client(Box::new(handler.clone()));
        self.transport.set_transmit_client(Box::new(handler));

        info!(
            "Node {} broadcasting from {}",
            self.node.node_id(),
            format_mac(&self.transport.local_address()),
        );

        let mut pending = self.schedule.clone().into_iter();
        let mut next = pending.next();
        // None until the first send, which fires immediately.
        let mut last_send: Option<Instant> = None;

        loop {
            let due = last_send.map_or(true, |at| at.elapsed() >= self.interval);
            if due {
                match next.take() {
                    Some(message) => {
                        let packet =
                            self.node.compose(message.kind, &message.body, message.group);
                        if let Err(err) = outbound::send_packet(
                            &mut self.transport,
                            self.node.peers(),
                            BROADCAST_ADDRESS,
                            &packet,
                        ) {
                            error!("Broadcast not sent: {:?}", err);
                        }
                        last_send = Some(Instant::now());
                        next = pending.next();
                    }
                    // One quiet interval after the last send, then stop.
                    None => break,
                }
            }

            if let Err(err) = self.transport.poll() {
                bail!("Fatal error: radio disconnected.\ncauses: {:?}", err);
            }
            match receiver.recv_timeout(Duration::from_millis(500)) {
                Ok(RadioEvent::Frame {
                    sender,
                    frame,
                    metadata,
                }) => {
                    // Acknowledgments carry sequence 0, so the filter drops
                    // them as stale once anything real was accepted; the drop
                    // is logged and that is all the tracking they get.
                    if let Ok((accepted, _)) =
                        self.node
                            .handle_frame(sender, &frame, metadata, &mut NoHooks)
                    {
                        info!(
                            "Reply from {}: {}",
                            accepted.packet.sender_id, accepted.packet.body
                        );
                    }
                }
                Ok(RadioEvent::SendDone { target, status }) => {
                    info!(
                        "TX to {} -> {}",
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
        info!("Schedule exhausted, beacon going quiet.");
        Ok(())
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
