//! Scenario tests driving [`SimNetwork`] through the multi-node behaviours
//! described for the overlay core: link scores ramping up on repeated
//! first-hand observation, and a two-hop route forming when two nodes can
//! only hear each other through a common neighbour.

use std::time::Duration;

use relaymesh_core::interface::{InterfaceKind, SocketType};
use relaymesh_core::subscriber::Reachability;
use relaymesh_harness::{sim_interface, InvariantRegistry, NetworkSnapshot, SimNetwork};
use relaymesh_proto::Sid;

fn sid(byte: u8) -> Sid {
    Sid::from_bytes([byte; 32])
}

/// Scenario A: two nodes linked with no loss exchange self-announce frames
/// every tick; the direct link score should climb off zero within a few
/// seconds and the peers become subscribers of each other.
#[test]
fn direct_neighbour_score_ramps_up() {
    let mut net = SimNetwork::new(7);
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

    let registry = InvariantRegistry::standard();
    for _ in 0..10 {
        net.advance(Duration::from_millis(500));
        registry.assert_all(&NetworkSnapshot::capture(&net), "direct_neighbour_score_ramps_up");
    }

    let a_sees_b = net.node(a).neighbours().get(sid(2)).expect("a has heard from b");
    let (_, score) = a_sees_b.best_score().expect("a has a scored link to b");
    assert!(score > 0, "direct link score should have climbed above zero, got {score}");

    assert_eq!(net.node(a).subscribers().get(sid(2)).map(|s| s.reachability()), Some(Reachability::Broadcast));
    assert_eq!(net.node(b).subscribers().get(sid(1)).map(|s| s.reachability()), Some(Reachability::Broadcast));
}

/// Scenario C: A only links to B, and B only links to C. A and C should
/// never hear each other directly, but after B has learned both, A should
/// resolve C as an indirect subscriber reachable via B.
#[test]
fn two_hop_route_forms_through_common_neighbour() {
    let mut net = SimNetwork::new(11);
    let a = net.add_node(sid(1));
    let b = net.add_node(sid(2));
    let c = net.add_node(sid(3));

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
    net.register_interface(
        b,
        sim_interface(
            1,
            "file1",
            InterfaceKind::PacketRadio,
            SocketType::File,
            1400,
            Some(Duration::from_millis(500)),
            Duration::from_millis(100),
        ),
    );
    net.register_interface(
        c,
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
    net.link(b, 1, c, 0, 0.0);

    let registry = InvariantRegistry::standard();
    for _ in 0..40 {
        net.advance(Duration::from_millis(500));
        registry.assert_all(&NetworkSnapshot::capture(&net), "two_hop_route_forms_through_common_neighbour");
    }

    let a_view_of_c = net.node(a).subscribers().get(sid(3)).expect("a should have resolved c indirectly");
    assert_eq!(a_view_of_c.reachability(), Reachability::Indirect);
    assert_eq!(a_view_of_c.next_hop(), Some(sid(2)));
}
