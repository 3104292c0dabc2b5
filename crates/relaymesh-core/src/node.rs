//! Per-destination routing state (spec §4.4): an observation ring fed by
//! neighbours' node-announcements, and the derived best-path summary used
//! to answer "how do we reach this subscriber".

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use relaymesh_proto::Sid;

use crate::interface::{InterfaceId, InterfaceKind};

/// Ring capacity (spec §3 `N=8`).
pub const OBSERVATION_RING_LEN: usize = 8;

/// One neighbour's report about a third-party destination.
#[derive(Debug, Clone, Copy)]
pub struct Observation<I> {
    sender: Sid,
    observed_score: u8,
    gateways_en_route: u8,
    rx_time: I,
    interface: InterfaceId,
}

impl<I> Observation<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Score discounted for age: `observed_score - floor(age_ms / 1000)`,
    /// clamped to 0.
    fn corrected_score(&self, now: I) -> u8 {
        let age_secs = u32::try_from((now - self.rx_time).as_secs()).unwrap_or(u32::MAX);
        u8::try_from(u32::from(self.observed_score).saturating_sub(age_secs)).unwrap_or(0)
    }
}

/// Reachability summary derived for one non-self subscriber (spec §4.4
/// best-path selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestPath {
    /// Directly reachable by broadcasting on this interface.
    Direct { interface: InterfaceId },
    /// Reachable via a neighbour's advertised path.
    Indirect { next_hop: Sid },
    /// No known path.
    None,
}

/// Routing state attached to one non-self subscriber.
#[derive(Debug, Clone)]
pub struct Node<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    sid: Sid,
    ring: Vec<Option<Observation<I>>>,
    cursor: usize,
    best_path: BestPath,
    best_link_score: u8,
    last_first_hand_observation_time: Option<I>,
}

impl<I> Node<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build a fresh, unreachable node for `sid`.
    #[must_use]
    pub fn new(sid: Sid) -> Self {
        Self {
            sid,
            ring: vec![None; OBSERVATION_RING_LEN],
            cursor: 0,
            best_path: BestPath::None,
            best_link_score: 0,
            last_first_hand_observation_time: None,
        }
    }

    /// The subscriber this routing state describes.
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// Last computed best path.
    #[must_use]
    pub fn best_path(&self) -> BestPath {
        self.best_path
    }

    /// Score backing the current best path.
    #[must_use]
    pub fn best_link_score(&self) -> u8 {
        self.best_link_score
    }

    /// Time of the most recent direct (first-hand) observation, if any.
    #[must_use]
    pub fn last_first_hand_observation_time(&self) -> Option<I> {
        self.last_first_hand_observation_time
    }

    /// Write an observation into this node's ring, per `record_link`'s
    /// slot-finding rule: reuse an existing slot for `sender`, else the
    /// first empty slot, else random eviction.
    pub fn record_link(
        &mut self,
        now: I,
        sender: Sid,
        iface: InterfaceId,
        score: u8,
        gateways_en_route: u8,
        eviction_roll: u32,
    ) {
        let slot = self
            .ring
            .iter()
            .position(|o| o.is_some_and(|o| o.sender == sender))
            .or_else(|| self.ring.iter().position(Option::is_none))
            .unwrap_or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                let index = (eviction_roll as usize) % OBSERVATION_RING_LEN;
                index
            });

        self.ring[slot] = None;
        self.ring[slot] = Some(Observation {
            sender,
            observed_score: score,
            gateways_en_route,
            rx_time: now,
            interface: iface,
        });
    }

    /// Recompute `best_path` and `best_link_score` (spec §4.4 best-path
    /// selection). `direct_scores` is this subscriber's score as a direct
    /// neighbour on each up interface, paired with that interface's kind
    /// (empty if not a neighbour at all); `sender_reachable` reports
    /// whether an observation's reporting neighbour currently has any
    /// known path (first-hand trust check).
    ///
    /// When more than one interface could carry the frame, the candidate
    /// is chosen by interface type first (ethernet > wifi > unknown >
    /// packet-radio), tie-broken by interface id, per spec §4.2's
    /// comparator — not by raw score.
    pub fn recompute_best_path(
        &mut self,
        now: I,
        direct_scores: &[(InterfaceId, InterfaceKind, u8)],
        sender_reachable: impl Fn(Sid) -> bool,
    ) {
        if let Some((iface, _, score)) = direct_scores
            .iter()
            .copied()
            .filter(|(_, _, s)| *s > 0)
            .max_by_key(|(iface, kind, _)| (*kind, *iface))
        {
            self.best_path = BestPath::Direct { interface: iface };
            self.best_link_score = score;
            self.last_first_hand_observation_time = Some(now);
            return;
        }

        let best = self
            .ring
            .iter()
            .flatten()
            .filter(|obs| sender_reachable(obs.sender))
            .max_by_key(|obs| obs.corrected_score(now));

        match best {
            Some(obs) if obs.corrected_score(now) > 0 => {
                self.best_path = BestPath::Indirect { next_hop: obs.sender };
                self.best_link_score = obs.corrected_score(now);
            }
            _ => {
                self.best_path = BestPath::None;
                self.best_link_score = 0;
            }
        }
    }

    /// Highest `gateways_en_route` reported across valid observations, for
    /// directory-service proxy selection.
    #[must_use]
    pub fn max_gateways_en_route(&self) -> u8 {
        self.ring.iter().flatten().map(|o| o.gateways_en_route).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    #[test]
    fn direct_score_wins_over_indirect_observations() {
        let mut node = Node::<Instant>::new(sid(2));
        let now = Instant::now();
        node.record_link(now, sid(3), 0, 200, 0, 0);
        node.recompute_best_path(now, &[(0, InterfaceKind::Wifi, 50)], |_| true);
        assert_eq!(node.best_path(), BestPath::Direct { interface: 0 });
        assert_eq!(node.best_link_score(), 50);
    }

    #[test]
    fn direct_candidate_chosen_by_interface_type_not_score() {
        let mut node = Node::<Instant>::new(sid(2));
        let now = Instant::now();
        let direct_scores = [(0, InterfaceKind::PacketRadio, 200), (1, InterfaceKind::Ethernet, 10)];
        node.recompute_best_path(now, &direct_scores, |_| true);
        assert_eq!(node.best_path(), BestPath::Direct { interface: 1 });
        assert_eq!(node.best_link_score(), 10);
    }

    #[test]
    fn indirect_path_chosen_when_no_direct_score() {
        let mut node = Node::<Instant>::new(sid(2));
        let now = Instant::now();
        node.record_link(now, sid(3), 0, 200, 0, 0);
        node.recompute_best_path(now, &[], |_| true);
        assert_eq!(node.best_path(), BestPath::Indirect { next_hop: sid(3) });
    }

    #[test]
    fn unreachable_sender_observation_is_ignored() {
        let mut node = Node::<Instant>::new(sid(2));
        let now = Instant::now();
        node.record_link(now, sid(3), 0, 200, 0, 0);
        node.recompute_best_path(now, &[], |_| false);
        assert_eq!(node.best_path(), BestPath::None);
    }

    #[test]
    fn aged_observation_corrects_score_downward() {
        let mut node = Node::<Instant>::new(sid(2));
        let t0 = Instant::now();
        node.record_link(t0, sid(3), 0, 10, 0, 0);
        let later = t0 + Duration::from_secs(20);
        node.recompute_best_path(later, &[], |_| true);
        assert_eq!(node.best_path(), BestPath::None);
    }

    #[test]
    fn record_link_reuses_existing_sender_slot() {
        let mut node = Node::<Instant>::new(sid(2));
        let now = Instant::now();
        node.record_link(now, sid(3), 0, 10, 0, 0);
        node.record_link(now, sid(3), 0, 200, 1, 0);
        let filled = node.ring.iter().filter(|o| o.is_some()).count();
        assert_eq!(filled, 1);
    }
}
