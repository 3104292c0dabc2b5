//! Deterministic multi-node network simulation.
//!
//! [`SimNetwork`] wires several [`Context`]s together over virtual links
//! instead of real sockets: `advance` steps the shared [`SimEnv`] clock,
//! lets every node tick and drain its scheduler, and delivers the
//! resulting packets to whichever peers are linked to the sending
//! (node, interface) pair, optionally dropping a fraction of them.
//! This plays the role the teacher's `SimDriver` plays for the App/Bridge
//! stack (inject events, capture outgoing frames, check invariants after
//! each step) but drives the overlay core's node-to-node traffic instead
//! of a single client's UI events.

use std::time::Duration;

use relaymesh_core::{
    context::CoreAction, interface::InterfaceId, scheduler::Recipient, Context, TokenBucket,
};
use relaymesh_proto::Sid;

use crate::sim_env::{SimEnv, VirtualInstant};

/// Index of a node within a [`SimNetwork`].
pub type NodeIndex = usize;

/// A virtual link between two (node, interface) pairs. Delivery is
/// symmetric: a packet sent on either side reaches the other, modulo
/// `drop_rate`.
struct Link {
    node_a: NodeIndex,
    iface_a: InterfaceId,
    node_b: NodeIndex,
    iface_b: InterfaceId,
    drop_rate: f32,
}

/// A cluster of overlay nodes sharing one virtual clock and RNG.
pub struct SimNetwork {
    env: SimEnv,
    nodes: Vec<Context<SimEnv>>,
    links: Vec<Link>,
}

impl SimNetwork {
    /// Build an empty network driven by a freshly seeded environment.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { env: SimEnv::with_seed(seed), nodes: Vec::new(), links: Vec::new() }
    }

    /// The shared simulation environment, for direct `now()`/RNG access in
    /// tests.
    #[must_use]
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Add a node with the given identity. Returns its index.
    pub fn add_node(&mut self, sid: Sid) -> NodeIndex {
        self.nodes.push(Context::new(sid, self.env.clone()));
        self.nodes.len() - 1
    }

    /// Read-only access to one node's context.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &Context<SimEnv> {
        &self.nodes[index]
    }

    /// Number of nodes in the network.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if no nodes have been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register an interface on a node, for use with [`SimNetwork::link`].
    pub fn register_interface(
        &mut self,
        node: NodeIndex,
        interface: relaymesh_core::Interface<VirtualInstant>,
    ) {
        self.nodes[node].register_interface(interface);
    }

    /// Connect two (node, interface) pairs as a lossy broadcast medium.
    /// `drop_rate` is applied independently to each delivery attempt.
    pub fn link(
        &mut self,
        node_a: NodeIndex,
        iface_a: InterfaceId,
        node_b: NodeIndex,
        iface_b: InterfaceId,
        drop_rate: f32,
    ) {
        self.links.push(Link { node_a, iface_a, node_b, iface_b, drop_rate });
    }

    /// Move the shared clock forward by `dt`, tick every node, and drain
    /// every node's scheduler, delivering packets across links until no
    /// node has anything left to send.
    pub fn advance(&mut self, dt: Duration) {
        self.env.advance(dt);

        for index in 0..self.nodes.len() {
            let actions = self.nodes[index].tick();
            self.apply(index, actions);
        }

        loop {
            let mut any = false;
            for index in 0..self.nodes.len() {
                if let Some(action) = self.nodes[index].drain_one() {
                    any = true;
                    self.apply(index, vec![action]);
                }
            }
            if !any {
                break;
            }
        }
    }

    fn apply(&mut self, from: NodeIndex, actions: Vec<CoreAction>) {
        for action in actions {
            if let CoreAction::SendPacket { interface, recipient, bytes } = action {
                self.deliver(from, interface, recipient, &bytes);
            }
            // Advertisement/probe/content-store/please-explain actions have
            // no transport counterpart in this simulation; scenarios assert
            // on subscriber/route state directly instead.
        }
    }

    fn deliver(&mut self, from: NodeIndex, iface: InterfaceId, _recipient: Recipient, bytes: &[u8]) {
        let peers: Vec<(NodeIndex, InterfaceId)> = self
            .links
            .iter()
            .filter_map(|link| {
                if link.node_a == from && link.iface_a == iface {
                    Some((link.node_b, link.iface_b, link.drop_rate))
                } else if link.node_b == from && link.iface_b == iface {
                    Some((link.node_a, link.iface_a, link.drop_rate))
                } else {
                    None
                }
            })
            .map(|(node, iface, drop_rate)| {
                let roll = f64::from(self.env.random_u32()) / f64::from(u32::MAX);
                (node, iface, roll < f64::from(drop_rate))
            })
            .filter_map(|(node, iface, dropped)| (!dropped).then_some((node, iface)))
            .collect();

        for (node, iface) in peers {
            let _ = self.nodes[node].handle_ensemble(iface, None, bytes);
        }
    }
}

/// Convenience constructor for an [`Interface`](relaymesh_core::Interface)
/// suitable for [`SimNetwork`] links: a burst-5 token bucket refilling
/// every `packet_interval`.
#[must_use]
pub fn sim_interface(
    id: InterfaceId,
    name: &str,
    kind: relaymesh_core::interface::InterfaceKind,
    socket_type: relaymesh_core::interface::SocketType,
    mtu: usize,
    tick_interval: Option<Duration>,
    packet_interval: Duration,
) -> relaymesh_core::Interface<VirtualInstant> {
    relaymesh_core::Interface::new(
        id,
        name.to_string(),
        kind,
        socket_type,
        mtu,
        tick_interval,
        TokenBucket::new(5, packet_interval),
        true,
    )
}

#[cfg(test)]
mod tests {
    use relaymesh_core::interface::{InterfaceKind, SocketType};

    use super::*;

    fn sid(byte: u8) -> Sid {
        Sid::from_bytes([byte; 32])
    }

    #[test]
    fn two_linked_nodes_become_mutually_reachable() {
        let mut net = SimNetwork::new(1);
        let a = net.add_node(sid(1));
        let b = net.add_node(sid(2));

        net.register_interface(
            a,
            sim_interface(
                0,
                "file0",
                InterfaceKind::PacketRadio,
                SocketType::File,
                1400,
                Some(Duration::from_millis(500)),
                Duration::from_millis(100),
            ),
        );
        net.register_interface(
            b,
            sim_interface(
                0,
                "file0",
                InterfaceKind::PacketRadio,
                SocketType::File,
                1400,
                Some(Duration::from_millis(500)),
                Duration::from_millis(100),
            ),
        );
        net.link(a, 0, b, 0, 0.0);

        for _ in 0..8 {
            net.advance(Duration::from_millis(500));
        }

        assert!(net.node(a).subscribers().get(sid(2)).is_some());
        assert!(net.node(b).subscribers().get(sid(1)).is_some());
    }
}
