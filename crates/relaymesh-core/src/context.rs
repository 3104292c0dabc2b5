//! Top-level wiring (spec §3-§4): owns every table, dispatches decoded
//! ensembles, drives ticks, and drains the scheduler into packets.
//!
//! Uses the action pattern throughout: every method that reacts to an
//! event or to time takes `&mut self` plus the event/time and returns a
//! `Vec<CoreAction>` for the driver to execute. No I/O happens here.

use std::{collections::HashMap, net::SocketAddrV4};

use relaymesh_proto::{
    abbrev::EncodeContext,
    envelope::{Encap, Envelope},
    header::PayloadHeader,
    payloads::{
        nodeannounce::NodeAnnounce, please_explain::{PleaseExplain, Reason},
        rhizome::RhizomeAdvert, selfannounce::SelfAnnounceAck,
    },
    DecodedPayload, RecordOutcome, Sid,
};
use tracing::{debug, trace, warn};

use crate::{
    broadcast_dedup::BroadcastDedup,
    env::Environment,
    error::CoreError,
    frame::Frame,
    interface::{Interface, InterfaceId, InterfaceKind},
    neighbour::NeighbourTable,
    node::BestPath,
    queue::QueueClass,
    route_table::{RouteTable, RouteTransition},
    scheduler::{PacketPlan, Recipient, Scheduler},
    subscriber::{Reachability, SubscriberTable},
};

/// Actions for the driver to execute in response to a [`Context`] call.
#[derive(Debug)]
pub enum CoreAction {
    /// Hand a packed outgoing packet to the named interface.
    SendPacket {
        /// Interface to send on.
        interface: InterfaceId,
        /// Resolved recipient.
        recipient: Recipient,
        /// Fully encoded bytes ready for the wire.
        bytes: Vec<u8>,
    },
    /// A destination's score rose from zero: ask the scheduler to
    /// prioritise advertising ourselves back to it.
    RequestPriorityAdvertisement {
        /// Subscriber that became reachable.
        target: Sid,
    },
    /// A destination's score fell to zero: probe its last known address.
    ProbeUnicast {
        /// Subscriber that became unreachable.
        target: Sid,
    },
    /// A content-store advertisement arrived; out of the core's scope
    /// beyond handing it off (spec §1 Out of scope).
    ContentStoreAdvertReceived {
        /// Who sent it.
        from: Sid,
        /// The decoded advertisement.
        advert: RhizomeAdvert,
    },
    /// An interface was torn down (poll HUP/ERR or explicit unregister);
    /// its direct subscribers have been demoted to unreachable.
    InterfaceTornDown {
        /// The interface that went down.
        interface: InterfaceId,
    },
    /// A malformed or unresolvable record prompted a PLEASE-EXPLAIN back
    /// to the sender.
    SendPleaseExplain {
        /// Who to send it to.
        to: Sid,
        /// The reason payload.
        reason: PleaseExplain,
    },
}

/// All overlay state for one node, generic over the [`Environment`] that
/// supplies time and randomness.
pub struct Context<E: Environment> {
    self_sid: Sid,
    env: E,
    subscribers: SubscriberTable,
    neighbours: NeighbourTable<E::Instant>,
    routes: RouteTable<E::Instant>,
    interfaces: HashMap<InterfaceId, Interface<E::Instant>>,
    scheduler: Scheduler<E::Instant>,
    dedup: BroadcastDedup<E::Instant>,
    directory_service: Option<Sid>,
    sequence_windows: HashMap<InterfaceId, (u32, u32)>,
}

impl<E: Environment> Context<E> {
    /// Build a fresh context for local identity `self_sid`.
    #[must_use]
    pub fn new(self_sid: Sid, env: E) -> Self {
        Self {
            self_sid,
            subscribers: SubscriberTable::new(self_sid),
            neighbours: NeighbourTable::new(),
            routes: RouteTable::new(),
            interfaces: HashMap::new(),
            scheduler: Scheduler::new(),
            dedup: BroadcastDedup::new(),
            directory_service: None,
            sequence_windows: HashMap::new(),
            env,
        }
    }

    /// The local identity.
    #[must_use]
    pub fn self_sid(&self) -> Sid {
        self.self_sid
    }

    /// Read-only access to the subscriber pool.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberTable {
        &self.subscribers
    }

    /// Read-only access to the link table.
    #[must_use]
    pub fn neighbours(&self) -> &NeighbourTable<E::Instant> {
        &self.neighbours
    }

    /// Read-only access to the route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable<E::Instant> {
        &self.routes
    }

    /// Configure an optional directory-service proxy subscriber (spec
    /// §4.5 destination resolution fallback).
    pub fn set_directory_service(&mut self, sid: Option<Sid>) {
        self.directory_service = sid;
    }

    /// Register a new interface, keyed by its id.
    pub fn register_interface(&mut self, interface: Interface<E::Instant>) {
        self.interfaces.insert(interface.id(), interface);
    }

    /// Tear down an interface: mark it down and demote its direct
    /// subscribers (spec §4.2 lifecycle).
    pub fn unregister_interface(&mut self, iface: InterfaceId) -> Vec<CoreAction> {
        if let Some(interface) = self.interfaces.get_mut(&iface) {
            interface.mark_down();
        }
        for subscriber in self.subscribers.iter_mut() {
            if subscriber.interface() == Some(iface) {
                subscriber.set_unreachable();
            }
        }
        vec![CoreAction::InterfaceTornDown { interface: iface }]
    }

    /// Decode and dispatch one inbound ensemble received on `iface` (spec
    /// §4.1 TTL and forwarding rules, §4.3/§4.4 observation recording).
    pub fn handle_ensemble(
        &mut self,
        iface: InterfaceId,
        from_addr: Option<SocketAddrV4>,
        bytes: &[u8],
    ) -> Result<Vec<CoreAction>, CoreError> {
        let now = self.env.now();
        let ensemble = relaymesh_proto::codec::decode(bytes)?;
        let mut actions = Vec::new();

        if let Some(addr) = from_addr {
            self.subscribers.get_or_create(ensemble.envelope.sender).set_last_address(addr);
        }

        if ensemble.invalid_addresses > 0 {
            actions.push(CoreAction::SendPleaseExplain {
                to: ensemble.envelope.sender,
                reason: PleaseExplain::new(Reason::UnknownAddress, &[]),
            });
        }

        for record in ensemble.records {
            match record {
                RecordOutcome::Ok { mut header, payload } => {
                    header.ttl = header.ttl.saturating_sub(1);
                    actions.extend(self.dispatch_record(iface, header, payload, now));
                },
                RecordOutcome::Skipped { reason } => {
                    debug!(?reason, "skipped payload record");
                },
            }
        }

        Ok(actions)
    }

    fn dispatch_record(
        &mut self,
        iface: InterfaceId,
        header: PayloadHeader,
        payload: DecodedPayload,
        now: E::Instant,
    ) -> Vec<CoreAction> {
        let mut actions = Vec::new();
        let is_broadcast = header.destination.is_none();
        let is_for_self = header.destination == Some(self.self_sid);
        let already_seen = header.broadcast_id.is_some_and(|id| self.dedup.has_seen(id, now));

        let process_locally = is_broadcast || is_for_self;
        let should_forward = header.ttl > 0
            && ((is_broadcast && !already_seen)
                || (header.nexthop == Some(self.self_sid) && !is_for_self));

        if let Some(id) = header.broadcast_id {
            self.dedup.mark_seen(id, now);
        }

        if process_locally {
            match &payload {
                DecodedPayload::SelfAnnounceAck(ack) => {
                    if is_for_self {
                        actions.extend(self.handle_self_announce_ack(iface, header.source, ack, now));
                    }
                },
                DecodedPayload::NodeAnnounce(announce) => {
                    actions.extend(self.handle_node_announce(header.source, iface, announce, now));
                },
                DecodedPayload::RhizomeAdvert(advert) => {
                    actions.push(CoreAction::ContentStoreAdvertReceived {
                        from: header.source,
                        advert: advert.clone(),
                    });
                },
                DecodedPayload::PleaseExplain(explain) => {
                    warn!(reason = ?explain.reason, from = %header.source, "peer reported malformed traffic");
                },
                DecodedPayload::Data(_) | DecodedPayload::LegacyUnknown(..) => {
                    trace!(from = %header.source, "delivered application payload locally");
                },
            }
        }

        if should_forward {
            let frame = Frame::new(
                header.source,
                header.destination,
                header.broadcast_id,
                header.ttl,
                header.queue,
                header.frame_type,
                payload_bytes(&payload),
                now,
                1,
            );
            let class = QueueClass::from_wire(header.queue);
            let reachable = header.destination.is_none_or(|d| self.is_reachable(d));
            let directory_reachable =
                self.directory_service.is_some_and(|d| self.is_reachable(d));
            if let Err(err) = self.scheduler.enqueue(class, frame, reachable, directory_reachable) {
                debug!(?err, "dropped frame during forward-enqueue");
            }
        }

        actions
    }

    fn handle_self_announce_ack(
        &mut self,
        iface: InterfaceId,
        neighbour: Sid,
        ack: &SelfAnnounceAck,
        now: E::Instant,
    ) -> Vec<CoreAction> {
        let roll = self.env.random_u32();
        self.neighbours.node_can_hear_me(neighbour, iface, ack.s1, ack.s2, now, roll);

        let up_interfaces: Vec<InterfaceId> =
            self.interfaces.values().filter(|i| i.is_up()).map(Interface::id).collect();
        self.neighbours.recompute_all(now, &up_interfaces);

        self.recompute_node(neighbour, now)
    }

    fn handle_node_announce(
        &mut self,
        via: Sid,
        iface: InterfaceId,
        announce: &NodeAnnounce,
        now: E::Instant,
    ) -> Vec<CoreAction> {
        let mut actions = Vec::new();
        for entry in &announce.entries {
            let Some(target) = self.resolve_prefix(entry.sid_prefix) else { continue };
            if target == self.self_sid {
                continue;
            }
            let roll = self.env.random_u32();
            let direct_scores = self.direct_scores_for(target);

            let mut route_table = std::mem::take(&mut self.routes);
            let transition = route_table.record_link(
                now,
                target,
                via,
                iface,
                entry.score,
                entry.gateways_en_route,
                roll,
                &direct_scores,
                |sender| self.is_reachable(sender),
            );
            self.routes = route_table;

            actions.extend(self.apply_route_transition(target, transition));
        }
        actions
    }

    fn recompute_node(&mut self, target: Sid, now: E::Instant) -> Vec<CoreAction> {
        let direct_scores = self.direct_scores_for(target);

        let mut route_table = std::mem::take(&mut self.routes);
        let transition =
            route_table.recompute_node(now, target, &direct_scores, |sender| self.is_reachable(sender));
        self.routes = route_table;

        self.apply_route_transition(target, transition)
    }

    fn apply_route_transition(
        &mut self,
        target: Sid,
        transition: RouteTransition,
    ) -> Vec<CoreAction> {
        match transition {
            RouteTransition::BecameReachable => {
                if let Some(node) = self.routes.get(target) {
                    self.apply_best_path_to_subscriber(target, node.best_path());
                }
                vec![CoreAction::RequestPriorityAdvertisement { target }]
            },
            RouteTransition::BecameUnreachable => {
                self.subscribers.get_or_create(target).set_unreachable();
                vec![CoreAction::ProbeUnicast { target }]
            },
            RouteTransition::Unchanged => Vec::new(),
        }
    }

    fn apply_best_path_to_subscriber(&mut self, target: Sid, path: BestPath) {
        let subscriber = self.subscribers.get_or_create(target);
        match path {
            BestPath::Direct { interface } => subscriber.set_direct(Reachability::Broadcast, interface),
            BestPath::Indirect { next_hop } => subscriber.set_indirect(next_hop),
            BestPath::None => subscriber.set_unreachable(),
        }
    }

    fn direct_scores_for(&self, sid: Sid) -> Vec<(InterfaceId, InterfaceKind, u8)> {
        let Some(slot) = self.neighbours.get(sid) else { return Vec::new() };
        self.interfaces
            .values()
            .filter_map(|iface| {
                let score = slot.score(iface.id());
                (score > 0).then_some((iface.id(), iface.kind(), score))
            })
            .collect()
    }

    fn is_reachable(&self, sid: Sid) -> bool {
        self.subscribers.get(sid).is_some_and(|s| s.reachability() != Reachability::None)
    }

    fn resolve_prefix(&self, prefix: [u8; 6]) -> Option<Sid> {
        self.subscribers.iter().map(crate::subscriber::Subscriber::sid).find(|sid| sid.as_bytes()[..6] == prefix)
    }

    /// Run periodic work due at `now`: interface ticks (self-announce) and
    /// the route table's 5s sweep.
    pub fn tick(&mut self) -> Vec<CoreAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        let up_interfaces: Vec<InterfaceId> =
            self.interfaces.values().filter(|i| i.is_up()).map(Interface::id).collect();
        for iface in up_interfaces {
            let window = self.sequence_windows.entry(iface).or_insert((0, 0));
            window.1 = window.1.saturating_add(500);
            let (s1, s2) = *window;

            let ack = SelfAnnounceAck { s1, s2, iface };
            let frame = Frame::new(
                self.self_sid,
                None,
                Some(self.env.random_broadcast_id()),
                1,
                QueueClass::MeshManagement.to_wire(),
                relaymesh_proto::payloads::TYPE_SELFANNOUNCE_ACK,
                selfannounce_payload_bytes(&ack),
                now,
                1,
            );
            if let Err(err) = self.scheduler.enqueue(QueueClass::MeshManagement, frame, true, false) {
                debug!(?err, "dropped self-announce frame");
            }
        }

        let mut route_table = std::mem::take(&mut self.routes);
        let transitions = route_table.maybe_tick(
            now,
            |sid| self.direct_scores_for(sid),
            |sender| self.is_reachable(sender),
        );
        self.routes = route_table;
        for (sid, transition) in transitions {
            actions.extend(self.apply_route_transition(sid, transition));
        }

        self.dedup.sweep(now);
        self.scheduler.evict_expired(now);

        actions
    }

    /// Pack and hand off the next outgoing packet, if any frame is
    /// currently ready to send (spec §4.5 Stuff pass).
    pub fn drain_one(&mut self) -> Option<CoreAction> {
        let now = self.env.now();
        let self_sid = self.self_sid;
        let subscribers = &self.subscribers;

        // Snapshot the interface metadata resolution/packing need, so the
        // rate-limit consumer below can borrow `self.interfaces` mutably
        // without overlapping a read borrow held by these closures.
        let mut broadcast_interfaces: Vec<InterfaceId> =
            self.interfaces.values().filter(|i| i.can_broadcast()).map(Interface::id).collect();
        broadcast_interfaces.sort_unstable();
        let iface_mtu: HashMap<InterfaceId, usize> =
            self.interfaces.iter().map(|(&id, i)| (id, i.mtu())).collect();

        let resolve = |frame: &Frame<E::Instant>| -> Option<(InterfaceId, Recipient)> {
            match frame.destination() {
                // Pick the first UP broadcast-capable interface this frame
                // hasn't gone out on yet, so it keeps resolving across
                // successive stuff passes until every one has carried it.
                None => broadcast_interfaces
                    .iter()
                    .find(|&&iface| !frame.sent_via(iface))
                    .map(|&id| (id, Recipient::Broadcast)),
                Some(dest) if dest == self_sid => None,
                Some(dest) => {
                    let subscriber = subscribers.get(dest)?;
                    match subscriber.reachability() {
                        Reachability::Broadcast | Reachability::Unicast => {
                            subscriber.interface().map(|iface| (iface, Recipient::Unicast(dest)))
                        },
                        Reachability::Indirect => {
                            let next_hop = subscriber.next_hop()?;
                            let hop = subscribers.get(next_hop)?;
                            hop.interface().map(|iface| (iface, Recipient::Unicast(next_hop)))
                        },
                        Reachability::None | Reachability::SelfIdentity => None,
                    }
                },
            }
        };

        let mtu_for = |iface: InterfaceId| iface_mtu.get(&iface).copied().unwrap_or(1400);
        let estimate_size = |frame: &Frame<E::Instant>| frame.payload().len() + 48;

        let mut scheduler = std::mem::take(&mut self.scheduler);
        let plan = scheduler.stuff_pass(
            now,
            mtu_for,
            resolve,
            |iface, at| {
                if let Some(interface) = self.interfaces.get_mut(&iface) {
                    interface.rate_limit_mut().consume(at);
                }
            },
            estimate_size,
            &broadcast_interfaces,
        );
        self.scheduler = scheduler;

        let PacketPlan { interface, recipient, frames } = plan?;
        let bytes = self.encode_packet(interface, &frames);
        Some(CoreAction::SendPacket { interface, recipient, bytes })
    }

    fn encode_packet(&self, _interface: InterfaceId, frames: &[Frame<E::Instant>]) -> Vec<u8> {
        let unicast = frames.iter().all(|f| f.destination().is_some());
        let envelope = Envelope {
            encap: Encap::Overlay,
            sender: self.self_sid,
            unicast,
            interface_number: None,
            sequence: None,
        };
        let mut out = Vec::new();
        envelope.encode(&mut out);
        let mut ctx = EncodeContext::new(self.self_sid);

        for frame in frames {
            let header = PayloadHeader {
                source: frame.source(),
                destination: frame.destination(),
                nexthop: frame.next_hop(),
                broadcast_id: frame.broadcast_id(),
                one_hop: false,
                ttl: frame.ttl(),
                queue: frame.queue(),
                frame_type: frame.frame_type(),
            };
            let mut record = Vec::new();
            header.encode(self.self_sid, &mut ctx, &mut record);
            record.extend_from_slice(frame.payload());
            #[allow(clippy::cast_possible_truncation)]
            out.extend_from_slice(&(record.len() as u16).to_be_bytes());
            out.extend_from_slice(&record);
        }
        out
    }
}

fn payload_bytes(payload: &DecodedPayload) -> Vec<u8> {
    let mut bytes = Vec::new();
    payload.encode(&mut bytes);
    bytes
}

fn selfannounce_payload_bytes(ack: &SelfAnnounceAck) -> Vec<u8> {
    let mut bytes = Vec::new();
    ack.encode(&mut bytes);
    bytes
}
