//! Link table: per-neighbour observation rings and score recomputation
//! (spec §4.3).
//!
//! Each directly-heard neighbour gets a ring of up to [`RING_LEN`] link
//! observations per local interface it's been heard on, and a derived
//! score per local interface. A [`NeighbourTable`] is a capacity-bounded
//! map rather than the original's index-addressed fixed array with a
//! reserved slot 0 — a `HashMap` already gives us O(1) lookup by SID
//! without needing a sentinel index, so the reserved-slot trick doesn't
//! carry over.

use std::{
    collections::HashMap,
    ops::Sub,
    time::{Duration, Instant},
};

use relaymesh_proto::Sid;

use crate::interface::InterfaceId;

/// Maximum directly-heard neighbours tracked at once (spec §3 `K=128`).
pub const MAX_NEIGHBOURS: usize = 128;

/// Observation ring length per neighbour (spec §3 `N=8`).
pub const RING_LEN: usize = 8;

/// Minimum interval between score recomputations for one neighbour.
pub const SCORE_RECOMPUTE_INTERVAL: Duration = Duration::from_millis(500);

const WINDOW_LONG: Duration = Duration::from_secs(200);
const WINDOW_SHORT: Duration = Duration::from_secs(5);
const WINDOW_SHORT_CAP_MS: u64 = 5000;
const MAX_PLAUSIBLE_INTERVAL: Duration = Duration::from_secs(3600);

/// One contiguous interval during which a neighbour's self-announcements
/// were heard on a given local interface.
#[derive(Debug, Clone, Copy)]
struct LinkObservation<I> {
    s1: u32,
    s2: u32,
    sender_interface: InterfaceId,
    time: I,
    valid: bool,
}

/// State for one directly-heard neighbour.
#[derive(Debug, Clone)]
pub struct NeighbourSlot<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    ring: Vec<Option<LinkObservation<I>>>,
    cursor: usize,
    scores: HashMap<InterfaceId, u8>,
    last_recompute: Option<I>,
}

impl<I> Default for NeighbourSlot<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self { ring: vec![None; RING_LEN], cursor: 0, scores: HashMap::new(), last_recompute: None }
    }
}

impl<I> NeighbourSlot<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Current score on local interface `iface`, or 0 if never computed.
    #[must_use]
    pub fn score(&self, iface: InterfaceId) -> u8 {
        self.scores.get(&iface).copied().unwrap_or(0)
    }

    /// Highest score across all interfaces, with the interface it's on.
    #[must_use]
    pub fn best_score(&self) -> Option<(InterfaceId, u8)> {
        self.scores.iter().max_by_key(|(_, score)| **score).map(|(iface, score)| (*iface, *score))
    }

    fn newest_mut(&mut self) -> Option<&mut LinkObservation<I>> {
        self.ring[self.cursor].as_mut()
    }

    fn advance_ring(&mut self) {
        self.cursor = (self.cursor + 1) % RING_LEN;
    }

    /// Apply the merge rule (spec §4.3) for a newly heard self-announcement
    /// interval `[s1, s2]` on `sender_iface`.
    pub fn record_observation(&mut self, sender_iface: InterfaceId, s1: u32, s2: u32, now: I) {
        let mergeable = self
            .newest_mut()
            .filter(|obs| obs.valid && obs.sender_interface == sender_iface)
            .is_some_and(|obs| obs.s2 >= s1.saturating_sub(1));

        if mergeable {
            if let Some(obs) = self.newest_mut() {
                obs.s2 = obs.s2.max(s2);
                obs.time = now;
                return;
            }
        }

        self.advance_ring();
        self.ring[self.cursor] =
            Some(LinkObservation { s1, s2, sender_interface: sender_iface, time: now, valid: true });
    }

    /// Recompute this neighbour's per-interface scores, provided at least
    /// [`SCORE_RECOMPUTE_INTERVAL`] has elapsed since the last call.
    /// Returns `true` if any score changed.
    pub fn maybe_recompute_scores(&mut self, now: I, interfaces: &[InterfaceId]) -> bool {
        if let Some(last) = self.last_recompute {
            if now - last < SCORE_RECOMPUTE_INTERVAL {
                return false;
            }
        }
        self.last_recompute = Some(now);

        let mut changed = false;
        for &iface in interfaces {
            let new_score = self.recompute_one(iface, now);
            let old_score = self.scores.get(&iface).copied();
            if old_score != Some(new_score) {
                if new_score == 0 {
                    self.scores.remove(&iface);
                } else {
                    self.scores.insert(iface, new_score);
                }
                changed = true;
            }
        }
        changed
    }

    fn recompute_one(&self, iface: InterfaceId, now: I) -> u8 {
        let mut ms_200 = 0u64;
        let mut ms_5 = 0u64;

        for obs in self.ring.iter().flatten() {
            if !obs.valid || obs.sender_interface != iface {
                continue;
            }
            let interval_ms = u64::from(obs.s2.saturating_sub(obs.s1));
            if Duration::from_millis(interval_ms) > MAX_PLAUSIBLE_INTERVAL {
                continue;
            }
            let age = now - obs.time;
            if age <= WINDOW_LONG {
                ms_200 += interval_ms;
            }
            if age <= WINDOW_SHORT {
                ms_5 += interval_ms;
            }
        }
        ms_5 = ms_5.min(WINDOW_SHORT_CAP_MS);

        if ms_200 == 0 {
            return 0;
        }

        let contrib_200 = ms_200 as f64 * 128.0 / 200_000.0;
        let contrib_5 = ms_5 as f64 * 128.0 / 5_000.0;

        let raw = if contrib_5 == 0.0 { contrib_200 / 2.0 } else { contrib_5 + contrib_200 };
        raw.clamp(1.0, 255.0).round() as u8
    }
}

/// Table of directly-heard neighbours, keyed by SID.
#[derive(Debug, Clone, Default)]
pub struct NeighbourTable<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    slots: HashMap<Sid, NeighbourSlot<I>>,
}

impl<I> NeighbourTable<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    /// Look up a neighbour's slot.
    #[must_use]
    pub fn get(&self, sid: Sid) -> Option<&NeighbourSlot<I>> {
        self.slots.get(&sid)
    }

    /// Number of neighbours currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if no neighbours are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record that `neighbour` was heard announcing interval `[s1, s2]` on
    /// `sender_iface`, evicting a random existing entry first if the table
    /// is full and `neighbour` is new (spec §4.3 eviction policy).
    pub fn node_can_hear_me(
        &mut self,
        neighbour: Sid,
        sender_iface: InterfaceId,
        s1: u32,
        s2: u32,
        now: I,
        eviction_roll: u32,
    ) {
        if !self.slots.contains_key(&neighbour) && self.slots.len() >= MAX_NEIGHBOURS {
            self.evict_random(eviction_roll);
        }
        self.slots.entry(neighbour).or_default().record_observation(sender_iface, s1, s2, now);
    }

    fn evict_random(&mut self, roll: u32) {
        if self.slots.is_empty() {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = (roll as usize) % self.slots.len();
        if let Some(key) = self.slots.keys().nth(index).copied() {
            self.slots.remove(&key);
        }
    }

    /// Recompute scores for every tracked neighbour against the given set
    /// of local interfaces. Returns the SIDs whose scores changed.
    pub fn recompute_all(&mut self, now: I, interfaces: &[InterfaceId]) -> Vec<Sid> {
        self.slots
            .iter_mut()
            .filter_map(|(sid, slot)| slot.maybe_recompute_scores(now, interfaces).then_some(*sid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFACE: InterfaceId = 0;

    #[test]
    fn mergeable_intervals_extend_the_newest_slot() {
        let mut slot = NeighbourSlot::<Instant>::default();
        let t0 = Instant::now();
        slot.record_observation(IFACE, 1000, 2000, t0);
        slot.record_observation(IFACE, 2000, 3000, t0);
        assert_eq!(slot.ring[slot.cursor].unwrap().s1, 1000);
        assert_eq!(slot.ring[slot.cursor].unwrap().s2, 3000);
    }

    #[test]
    fn non_mergeable_interval_advances_the_ring() {
        let mut slot = NeighbourSlot::<Instant>::default();
        let t0 = Instant::now();
        slot.record_observation(IFACE, 1000, 2000, t0);
        slot.record_observation(IFACE, 500_000, 501_000, t0);
        let filled = slot.ring.iter().filter(|o| o.is_some()).count();
        assert_eq!(filled, 2);
    }

    #[test]
    fn steady_announcements_produce_a_positive_score() {
        let mut slot = NeighbourSlot::<Instant>::default();
        let t0 = Instant::now();
        slot.record_observation(IFACE, 0, 4000, t0);
        assert!(slot.maybe_recompute_scores(t0, &[IFACE]));
        assert!(slot.score(IFACE) > 0);
    }

    #[test]
    fn recompute_is_rate_limited() {
        let mut slot = NeighbourSlot::<Instant>::default();
        let t0 = Instant::now();
        slot.record_observation(IFACE, 0, 4000, t0);
        assert!(slot.maybe_recompute_scores(t0, &[IFACE]));
        assert!(!slot.maybe_recompute_scores(t0 + Duration::from_millis(100), &[IFACE]));
    }

    #[test]
    fn table_evicts_when_full() {
        let mut table = NeighbourTable::<Instant>::new();
        let t0 = Instant::now();
        for i in 0..MAX_NEIGHBOURS {
            #[allow(clippy::cast_possible_truncation)]
            let sid = Sid::from_bytes([i as u8; 32]);
            table.node_can_hear_me(sid, IFACE, 0, 1000, t0, 0);
        }
        assert_eq!(table.len(), MAX_NEIGHBOURS);
        let overflow_sid = Sid::from_bytes([200; 32]);
        table.node_can_hear_me(overflow_sid, IFACE, 0, 1000, t0, 3);
        assert_eq!(table.len(), MAX_NEIGHBOURS);
        assert!(table.get(overflow_sid).is_some());
    }
}
