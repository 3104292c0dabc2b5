//! Observable state extracted from a [`SimNetwork`](crate::SimNetwork) for
//! invariant checking.

use relaymesh_core::{interface::InterfaceId, subscriber::Reachability};
use relaymesh_proto::Sid;

use crate::SimNetwork;

/// One subscriber's reachability as seen by one node.
#[derive(Debug, Clone)]
pub struct SubscriberSnapshot {
    /// The subscriber described.
    pub sid: Sid,
    /// Its current reachability.
    pub reachability: Reachability,
    /// Interface it's reached through, if direct.
    pub interface: Option<InterfaceId>,
    /// Next-hop neighbour, if indirect.
    pub next_hop: Option<Sid>,
}

/// One node's full subscriber table.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    /// The node's own identity.
    pub self_sid: Sid,
    /// Every subscriber it currently knows about.
    pub subscribers: Vec<SubscriberSnapshot>,
}

/// A point-in-time view across every node in a [`SimNetwork`].
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    /// Per-node subscriber snapshots.
    pub nodes: Vec<NodeSnapshot>,
}

impl NetworkSnapshot {
    /// Capture the current state of every node in `network`.
    #[must_use]
    pub fn capture(network: &SimNetwork) -> Self {
        let nodes = (0..network.len())
            .map(|index| {
                let context = network.node(index);
                let subscribers = context
                    .subscribers()
                    .iter()
                    .map(|s| SubscriberSnapshot {
                        sid: s.sid(),
                        reachability: s.reachability(),
                        interface: s.interface(),
                        next_hop: s.next_hop(),
                    })
                    .collect();
                NodeSnapshot { self_sid: context.self_sid(), subscribers }
            })
            .collect();
        Self { nodes }
    }
}
