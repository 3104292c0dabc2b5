//! Multi-hop route table (spec §4.4): one [`Node`] per non-self subscriber,
//! recomputed on each incoming advertisement and swept every 5s so stale
//! observations age out without needing an event.

use std::{
    collections::HashMap,
    ops::Sub,
    time::{Duration, Instant},
};

use relaymesh_proto::Sid;

use crate::{
    interface::{InterfaceId, InterfaceKind},
    node::{BestPath, Node},
};

/// Minimum interval between full route-table sweeps (spec §4.4 Tick).
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// What happened to a node's reachability across a recomputation, driving
/// the probe/advertise transitions in spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTransition {
    /// Went from unreachable to reachable: request a priority
    /// advertisement.
    BecameReachable,
    /// Went from reachable to unreachable: send a unicast probe to the
    /// last known address.
    BecameUnreachable,
    /// No change in reachability class.
    Unchanged,
}

fn transition(before: BestPath, after: BestPath) -> RouteTransition {
    match (before == BestPath::None, after == BestPath::None) {
        (true, false) => RouteTransition::BecameReachable,
        (false, true) => RouteTransition::BecameUnreachable,
        _ => RouteTransition::Unchanged,
    }
}

/// Route table keyed by destination SID.
#[derive(Debug, Clone)]
pub struct RouteTable<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    nodes: HashMap<Sid, Node<I>>,
    last_tick: Option<I>,
}

impl<I> Default for RouteTable<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self { nodes: HashMap::new(), last_tick: None }
    }
}

impl<I> RouteTable<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up routing state for `sid`, if any has been recorded.
    #[must_use]
    pub fn get(&self, sid: Sid) -> Option<&Node<I>> {
        self.nodes.get(&sid)
    }

    /// Record an advertisement from neighbour `via` about destination `to`,
    /// then immediately recompute `to`'s best path and report the
    /// resulting transition.
    pub fn record_link(
        &mut self,
        now: I,
        to: Sid,
        via: Sid,
        iface: InterfaceId,
        score: u8,
        gateways_en_route: u8,
        eviction_roll: u32,
        direct_scores: &[(InterfaceId, InterfaceKind, u8)],
        sender_reachable: impl Fn(Sid) -> bool,
    ) -> RouteTransition {
        let node = self.nodes.entry(to).or_insert_with(|| Node::new(to));
        node.record_link(now, via, iface, score, gateways_en_route, eviction_roll);
        let before = node.best_path();
        node.recompute_best_path(now, direct_scores, sender_reachable);
        transition(before, node.best_path())
    }

    /// Unconditionally recompute `target`'s best path (spec §4.3
    /// invariant: a neighbour score change recomputes derived node
    /// metrics immediately, not just on the 5s sweep). No-op if `target`
    /// has no routing state yet.
    pub fn recompute_node(
        &mut self,
        now: I,
        target: Sid,
        direct_scores: &[(InterfaceId, InterfaceKind, u8)],
        sender_reachable: impl Fn(Sid) -> bool,
    ) -> RouteTransition {
        let Some(node) = self.nodes.get_mut(&target) else { return RouteTransition::Unchanged };
        let before = node.best_path();
        node.recompute_best_path(now, direct_scores, sender_reachable);
        transition(before, node.best_path())
    }

    /// Run the periodic sweep (spec §4.4 Tick) if at least
    /// [`TICK_INTERVAL`] has elapsed since the last one. `direct_scores`
    /// and `sender_reachable` are evaluated per-node by the caller, since
    /// they depend on live neighbour/subscriber state this table doesn't
    /// own.
    pub fn maybe_tick(
        &mut self,
        now: I,
        direct_scores: impl Fn(Sid) -> Vec<(InterfaceId, InterfaceKind, u8)>,
        sender_reachable: impl Fn(Sid) -> bool,
    ) -> Vec<(Sid, RouteTransition)> {
        if let Some(last) = self.last_tick {
            if now - last < TICK_INTERVAL {
                return Vec::new();
            }
        }
        self.last_tick = Some(now);

        self.nodes
            .iter_mut()
            .filter_map(|(sid, node)| {
                let before = node.best_path();
                let scores = direct_scores(*sid);
                node.recompute_best_path(now, &scores, &sender_reachable);
                let result = transition(before, node.best_path());
                (result != RouteTransition::Unchanged).then_some((*sid, result))
            })
            .collect()
    }

    /// Number of destinations with any routing state recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if no destinations have routing state recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
