use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};

use espnow_link_poc::device::frame::{MessageKind, Packet};
use espnow_link_poc::node::router::NodeHooks;
use espnow_link_poc::node::{LinkNode, NodeConfig};
use espnow_link_poc::MacAddress;

mod beacon;
mod listener;
mod loopback;

use beacon::{Beacon, ScheduledMessage};
use listener::Listener;
use loopback::Airwaves;

const BROADCASTER_MAC: MacAddress = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC];
const NODE_G1_MAC: MacAddress = [0x9C, 0x9C, 0x1F, 0xD6, 0x8B, 0x34];
const NODE_G2_MAC: MacAddress = [0x9C, 0x9C, 0x1F, 0xD6, 0x8B, 0x35];

const SEND_INTERVAL: Duration = Duration::from_secs(5);

/// What the demo receivers actually do when told to.
struct DemoHooks;

impl NodeHooks for DemoHooks {
    fn on_command(&mut self, packet: &Packet) {
        info!("Executing command: {}", packet.body);
    }

    fn on_alert(&mut self, packet: &Packet) {
        warn!("Emergency handling for: {}", packet.body);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let air = Airwaves::new();

    // Group 1 receiver only trusts the broadcaster.
    let mut g1_config = NodeConfig::dispatch("NODE_G1_001", 1);
    g1_config.require_known_sender = true;
    let mut g1_node = LinkNode::new(g1_config);
    g1_node.add_peer(BROADCASTER_MAC, 0, false);
    let mut g1 = Listener::new(g1_node, air.endpoint(NODE_G1_MAC));

    // Group 2 receiver takes frames from anyone.
    let g2_node = LinkNode::new(NodeConfig::dispatch("NODE_G2_001", 2));
    let mut g2 = Listener::new(g2_node, air.endpoint(NODE_G2_MAC));

    thread::Builder::new().name("node-g1".into()).spawn(move || {
        if let Err(err) = g1.spawn(&mut DemoHooks) {
            error!("Listener stopped: {:?}", err);
        }
    })?;
    thread::Builder::new().name("node-g2".into()).spawn(move || {
        if let Err(err) = g2.spawn(&mut DemoHooks) {
            error!("Listener stopped: {:?}", err);
        }
    })?;

    let schedule = vec![
        ScheduledMessage {
            kind: MessageKind::Info,
            body: "Status update from broadcaster".to_owned(),
            group: 0,
        },
        ScheduledMessage {
            kind: MessageKind::Command,
            body: "Blink LED".to_owned(),
            group: 2,
        },
        ScheduledMessage {
            kind: MessageKind::Alert,
            body: "Temperature threshold exceeded".to_owned(),
            group: 0,
        },
        ScheduledMessage {
            kind: MessageKind::Command,
            body: "Report status".to_owned(),
            group: 1,
        },
        ScheduledMessage {
            kind: MessageKind::Info,
            body: "Broadcast cycle complete".to_owned(),
            group: 0,
        },
    ];

    let broadcaster = LinkNode::new(NodeConfig::dispatch("BROADCASTER", 0));
    let mut beacon = Beacon::new(
        broadcaster,
        air.endpoint(BROADCASTER_MAC),
        schedule,
        SEND_INTERVAL,
    );
    beacon.spawn()?;

    info!("Stopping!");
    Ok(())
}
