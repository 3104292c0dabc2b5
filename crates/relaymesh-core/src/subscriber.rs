//! Subscriber pool (spec §3).
//!
//! A subscriber is created the first time any code references its SID and
//! is never destroyed for the life of the [`crate::context::Context`] —
//! routing state (reachability, last-seen interface) accumulates on the
//! same record across the subscriber's whole lifetime.

use std::{collections::HashMap, net::SocketAddrV4};

use relaymesh_proto::Sid;

use crate::interface::InterfaceId;

/// How (and whether) a subscriber can currently be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    /// No known path.
    #[default]
    None,
    /// This is the local identity. Fixed for the lifetime of the context;
    /// never downgraded by routing (spec §3 invariant).
    SelfIdentity,
    /// Reachable by broadcasting on a directly-attached interface.
    Broadcast,
    /// Reachable by sending unicast on a directly-attached interface.
    Unicast,
    /// Reachable only via a next-hop neighbour.
    Indirect,
}

/// Routing-relevant state attached to one SID.
#[derive(Debug, Clone, Copy)]
pub struct Subscriber {
    sid: Sid,
    reachability: Reachability,
    /// Interface this subscriber is directly reachable through, when
    /// `reachability` is `Broadcast` or `Unicast`.
    interface: Option<InterfaceId>,
    /// Next-hop neighbour, when `reachability` is `Indirect`.
    next_hop: Option<Sid>,
    last_address: Option<SocketAddrV4>,
}

impl Subscriber {
    fn new(sid: Sid) -> Self {
        Self {
            sid,
            reachability: Reachability::None,
            interface: None,
            next_hop: None,
            last_address: None,
        }
    }

    /// This subscriber's SID.
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// Current reachability.
    #[must_use]
    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    /// Interface this subscriber is directly reachable through.
    #[must_use]
    pub fn interface(&self) -> Option<InterfaceId> {
        self.interface
    }

    /// Next-hop neighbour for an indirectly-reachable subscriber.
    #[must_use]
    pub fn next_hop(&self) -> Option<Sid> {
        self.next_hop
    }

    /// Last IPv4 endpoint this subscriber was observed sending from.
    #[must_use]
    pub fn last_address(&self) -> Option<SocketAddrV4> {
        self.last_address
    }

    /// Update the last-seen address cache.
    pub fn set_last_address(&mut self, addr: SocketAddrV4) {
        self.last_address = Some(addr);
    }

    /// Set direct reachability (broadcast or unicast) via `interface`.
    /// No-op for the self identity (spec §3: SELF is never downgraded).
    pub fn set_direct(&mut self, reachability: Reachability, interface: InterfaceId) {
        debug_assert!(matches!(reachability, Reachability::Broadcast | Reachability::Unicast));
        if self.reachability == Reachability::SelfIdentity {
            return;
        }
        self.reachability = reachability;
        self.interface = Some(interface);
        self.next_hop = None;
    }

    /// Set indirect reachability via `next_hop`. No-op for the self
    /// identity.
    pub fn set_indirect(&mut self, next_hop: Sid) {
        if self.reachability == Reachability::SelfIdentity {
            return;
        }
        self.reachability = Reachability::Indirect;
        self.next_hop = Some(next_hop);
        self.interface = None;
    }

    /// Clear reachability entirely. No-op for the self identity.
    pub fn set_unreachable(&mut self) {
        if self.reachability == Reachability::SelfIdentity {
            return;
        }
        self.reachability = Reachability::None;
        self.interface = None;
        self.next_hop = None;
    }
}

/// Pool of all subscribers ever referenced in this context.
#[derive(Debug, Clone, Default)]
pub struct SubscriberTable {
    subscribers: HashMap<Sid, Subscriber>,
}

impl SubscriberTable {
    /// Build an empty table, immediately registering `self_sid` as the
    /// fixed local identity.
    #[must_use]
    pub fn new(self_sid: Sid) -> Self {
        let mut table = Self { subscribers: HashMap::new() };
        let mut me = Subscriber::new(self_sid);
        me.reachability = Reachability::SelfIdentity;
        table.subscribers.insert(self_sid, me);
        table
    }

    /// Look up a subscriber without creating it.
    #[must_use]
    pub fn get(&self, sid: Sid) -> Option<&Subscriber> {
        self.subscribers.get(&sid)
    }

    /// Look up (creating if absent) a subscriber.
    pub fn get_or_create(&mut self, sid: Sid) -> &mut Subscriber {
        self.subscribers.entry(sid).or_insert_with(|| Subscriber::new(sid))
    }

    /// Number of subscribers known so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// `true` if no subscribers (other than self) are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.len() <= 1
    }

    /// Iterate all known subscribers.
    pub fn iter(&self) -> impl Iterator<Item = &Subscriber> {
        self.subscribers.values()
    }

    /// Iterate all known subscribers mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Subscriber> {
        self.subscribers.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    #[test]
    fn self_identity_is_seeded_and_fixed() {
        let mut table = SubscriberTable::new(sid(1));
        assert_eq!(table.get(sid(1)).unwrap().reachability(), Reachability::SelfIdentity);

        let me = table.get_or_create(sid(1));
        me.set_unreachable();
        assert_eq!(me.reachability(), Reachability::SelfIdentity);
    }

    #[test]
    fn unknown_subscriber_created_on_first_reference() {
        let mut table = SubscriberTable::new(sid(1));
        assert!(table.get(sid(9)).is_none());
        table.get_or_create(sid(9));
        assert!(table.get(sid(9)).is_some());
    }

    #[test]
    fn direct_then_indirect_transition_clears_stale_fields() {
        let mut table = SubscriberTable::new(sid(1));
        let peer = table.get_or_create(sid(2));
        peer.set_direct(Reachability::Broadcast, 0);
        assert_eq!(peer.interface(), Some(0));

        peer.set_indirect(sid(3));
        assert_eq!(peer.reachability(), Reachability::Indirect);
        assert_eq!(peer.next_hop(), Some(sid(3)));
        assert_eq!(peer.interface(), None);
    }
}
