//! Standard invariant checks over a [`NetworkSnapshot`].
//!
//! These check properties that must hold regardless of which scenario
//! produced the snapshot (spec §8 invariants 1 and 2, restated against
//! this crate's `HashMap`-backed subscriber/neighbour model rather than
//! the original's index-addressed arrays).

use relaymesh_core::subscriber::Reachability;

use super::{Invariant, InvariantResult, NetworkSnapshot, Violation};

/// A node's view of itself must stay `SelfIdentity` and never regress to
/// any other reachability (spec §8 invariant 1).
pub struct SelfReachabilityNeverClears;

impl Invariant for SelfReachabilityNeverClears {
    fn name(&self) -> &'static str {
        "self_reachability_never_clears"
    }

    fn check(&self, state: &NetworkSnapshot) -> InvariantResult {
        for node in &state.nodes {
            let Some(self_entry) = node.subscribers.iter().find(|s| s.sid == node.self_sid) else {
                continue;
            };
            if self_entry.reachability != Reachability::SelfIdentity {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "node {:?}: self entry reachability is {:?}, expected SelfIdentity",
                        node.self_sid, self_entry.reachability
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Every subscriber reported `Broadcast` or `Unicast` (direct) must carry
/// the interface it was heard on.
pub struct DirectSubscribersHaveAnInterface;

impl Invariant for DirectSubscribersHaveAnInterface {
    fn name(&self) -> &'static str {
        "direct_subscribers_have_an_interface"
    }

    fn check(&self, state: &NetworkSnapshot) -> InvariantResult {
        for node in &state.nodes {
            for subscriber in &node.subscribers {
                let direct = matches!(
                    subscriber.reachability,
                    Reachability::Broadcast | Reachability::Unicast
                );
                if direct && subscriber.interface.is_none() {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "node {:?}: direct subscriber {:?} has no interface",
                            node.self_sid, subscriber.sid
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every subscriber reported `Indirect` must carry a next hop, and that
/// next hop must not be the node's own identity.
pub struct IndirectSubscribersHaveANextHop;

impl Invariant for IndirectSubscribersHaveANextHop {
    fn name(&self) -> &'static str {
        "indirect_subscribers_have_a_next_hop"
    }

    fn check(&self, state: &NetworkSnapshot) -> InvariantResult {
        for node in &state.nodes {
            for subscriber in &node.subscribers {
                if subscriber.reachability != Reachability::Indirect {
                    continue;
                }
                match subscriber.next_hop {
                    None => {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "node {:?}: indirect subscriber {:?} has no next hop",
                                node.self_sid, subscriber.sid
                            ),
                        });
                    },
                    Some(hop) if hop == node.self_sid => {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "node {:?}: indirect subscriber {:?} routes through itself",
                                node.self_sid, subscriber.sid
                            ),
                        });
                    },
                    Some(_) => {},
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relaymesh_proto::Sid;

    use super::*;
    use crate::invariants::{NodeSnapshot, SubscriberSnapshot};

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    #[test]
    fn self_reachability_passes_for_self_identity() {
        let node = NodeSnapshot {
            self_sid: sid(1),
            subscribers: vec![SubscriberSnapshot {
                sid: sid(1),
                reachability: Reachability::SelfIdentity,
                interface: None,
                next_hop: None,
            }],
        };
        let snapshot = NetworkSnapshot { nodes: vec![node] };
        assert!(SelfReachabilityNeverClears.check(&snapshot).is_ok());
    }

    #[test]
    fn self_reachability_fails_when_self_entry_is_wrong() {
        let node = NodeSnapshot {
            self_sid: sid(1),
            subscribers: vec![SubscriberSnapshot {
                sid: sid(1),
                reachability: Reachability::None,
                interface: None,
                next_hop: None,
            }],
        };
        let snapshot = NetworkSnapshot { nodes: vec![node] };
        assert!(SelfReachabilityNeverClears.check(&snapshot).is_err());
    }

    #[test]
    fn direct_subscriber_without_interface_fails() {
        let node = NodeSnapshot {
            self_sid: sid(1),
            subscribers: vec![SubscriberSnapshot {
                sid: sid(2),
                reachability: Reachability::Broadcast,
                interface: None,
                next_hop: None,
            }],
        };
        let snapshot = NetworkSnapshot { nodes: vec![node] };
        assert!(DirectSubscribersHaveAnInterface.check(&snapshot).is_err());
    }

    #[test]
    fn indirect_subscriber_routing_through_self_fails() {
        let node = NodeSnapshot {
            self_sid: sid(1),
            subscribers: vec![SubscriberSnapshot {
                sid: sid(2),
                reachability: Reachability::Indirect,
                interface: None,
                next_hop: Some(sid(1)),
            }],
        };
        let snapshot = NetworkSnapshot { nodes: vec![node] };
        assert!(IndirectSubscribersHaveANextHop.check(&snapshot).is_err());
    }
}
