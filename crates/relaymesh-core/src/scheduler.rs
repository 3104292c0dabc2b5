//! Outbound scheduler (spec §4.5): enqueue admission control, alarm
//! recomputation, and the "stuff pass" that packs queued frames bound for
//! the same interface/recipient into one outgoing packet.
//!
//! This module never touches a socket. Resolution, MTU accounting and
//! rate-limit consumption are all supplied by the caller as closures, so
//! the same scheduling logic drives both the production driver and the
//! simulation harness.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use relaymesh_proto::Sid;

use crate::{
    error::CoreError,
    frame::Frame,
    interface::InterfaceId,
    queue::{OutboundQueues, QueueClass, ALL_CLASSES},
};

/// Grace period added after the earliest alarm so inbound I/O gets a
/// chance to fire first (spec §4.5 Alarm recomputation).
pub const ALARM_GRACE: Duration = Duration::from_millis(15);

/// Who a packed outgoing packet is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// A single resolved next-hop.
    Unicast(Sid),
    /// Link-layer broadcast on the interface.
    Broadcast,
}

/// The result of one stuff-pass firing: frames ready to be encoded and
/// sent as a single packet.
#[derive(Debug)]
pub struct PacketPlan<I> {
    /// Interface the packet goes out on.
    pub interface: InterfaceId,
    /// Resolved recipient.
    pub recipient: Recipient,
    /// Frames consumed into this packet, already bookkept (copies
    /// decremented / broadcast_sent_via updated).
    pub frames: Vec<Frame<I>>,
}

/// Admission-control and packing state for outbound traffic.
#[derive(Debug, Default)]
pub struct Scheduler<I = Instant> {
    queues: OutboundQueues<I>,
}

impl<I> Scheduler<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self { queues: OutboundQueues::new() }
    }

    /// Read-only access to the underlying queues, e.g. for metrics.
    #[must_use]
    pub fn queues(&self) -> &OutboundQueues<I> {
        &self.queues
    }

    /// Admit `frame` into `class` (spec §4.5 enqueue).
    ///
    /// `destination_reachable` and `directory_service_reachable` reflect
    /// current routing state for the frame's destination, evaluated by
    /// the caller since this module doesn't own the subscriber/route
    /// tables.
    pub fn enqueue(
        &mut self,
        class: QueueClass,
        frame: Frame<I>,
        destination_reachable: bool,
        directory_service_reachable: bool,
    ) -> Result<(), CoreError> {
        if !frame.is_broadcast() && !destination_reachable && !directory_service_reachable {
            return Err(CoreError::QueueCongested { queue_class: class.to_wire(), max_length: 0 });
        }
        if frame.send_copies() > crate::frame::MAX_SEND_COPIES {
            return Err(CoreError::ResourceExhausted("send_copies exceeds maximum"));
        }
        self.queues.push(class, frame);
        Ok(())
    }

    /// Evict expired frames from every queue, returning the count dropped.
    pub fn evict_expired(&mut self, now: I) -> usize {
        ALL_CLASSES.iter().map(|&class| self.queues.evict_expired(class, now)).sum()
    }
}

impl<I> Scheduler<I>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Compute the scheduler's next wakeup: the earliest `next_allowed`
    /// among interfaces carrying at least one queued, resolvable frame,
    /// plus [`ALARM_GRACE`]. `None` if nothing is queued.
    pub fn next_wakeup(
        &mut self,
        now: I,
        mut resolve: impl FnMut(&Frame<I>) -> Option<(InterfaceId, Recipient)>,
        mut next_allowed: impl FnMut(InterfaceId) -> I,
    ) -> Option<I> {
        let mut earliest: Option<I> = None;
        for class in ALL_CLASSES {
            for frame in self.queues.iter(class) {
                let Some((iface, _)) = resolve(frame) else { continue };
                let candidate = next_allowed(iface);
                earliest = Some(earliest.map_or(candidate, |e: I| e.min(candidate)));
            }
        }
        earliest.map(|e| e + ALARM_GRACE)
    }

    /// Build one outgoing packet from the highest-priority frames that
    /// share a resolved (interface, recipient), respecting `mtu_for` and
    /// consuming one rate-limit token via `consume_token` (spec §4.5
    /// Stuff pass). Returns `None` if no frame currently resolves.
    ///
    /// `broadcast_interfaces` lists every UP, broadcast-capable interface:
    /// a broadcast frame isn't exhausted (and so isn't removed from its
    /// queue) until it's been sent on every one of them, not just the
    /// interface this particular pass happened to target (spec §4.5,
    /// "mark sent-per-interface").
    pub fn stuff_pass(
        &mut self,
        now: I,
        mtu_for: impl Fn(InterfaceId) -> usize,
        mut resolve: impl FnMut(&Frame<I>) -> Option<(InterfaceId, Recipient)>,
        mut consume_token: impl FnMut(InterfaceId, I),
        estimate_size: impl Fn(&Frame<I>) -> usize,
        broadcast_interfaces: &[InterfaceId],
    ) -> Option<PacketPlan<I>> {
        for class in ALL_CLASSES {
            self.queues.evict_expired(class, now);
        }

        let mut target: Option<(InterfaceId, Recipient)> = None;
        'find_target: for class in ALL_CLASSES {
            for frame in self.queues.iter(class) {
                if let Some(found) = resolve(frame) {
                    target = Some(found);
                    break 'find_target;
                }
            }
        }
        let (target_iface, target_recipient) = target?;

        let mtu = mtu_for(target_iface);
        let mut used = 0usize;
        let mut packed = Vec::new();

        for class in ALL_CLASSES {
            let mut idx = 0;
            while idx < self.queues.len(class) {
                let Some(frame) = self.queues.iter(class).nth(idx) else { break };
                let Some((iface, recipient)) = resolve(frame) else {
                    idx += 1;
                    continue;
                };
                if iface != target_iface || recipient != target_recipient {
                    idx += 1;
                    continue;
                }

                let size = estimate_size(frame);
                if used + size > mtu {
                    idx += 1;
                    continue;
                }

                let exhausted = {
                    let frame = self.queues.get_mut(class, idx).expect("index bounded by len above");
                    match target_recipient {
                        Recipient::Unicast(sid) => {
                            frame.resolve(sid);
                            frame.consume_copy();
                        }
                        Recipient::Broadcast => {
                            frame.mark_broadcast_resolved();
                            frame.mark_sent_via(target_iface);
                        }
                    }
                    frame.is_exhausted(broadcast_interfaces)
                };

                used += size;
                consume_token(target_iface, now);

                if exhausted {
                    if let Some(frame) = self.queues.remove(class, idx) {
                        packed.push(frame);
                    }
                } else {
                    idx += 1;
                }
            }
        }

        if packed.is_empty() {
            return None;
        }
        Some(PacketPlan { interface: target_iface, recipient: target_recipient, frames: packed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    fn unicast_frame(now: Instant) -> Frame<Instant> {
        Frame::new(sid(1), Some(sid(2)), None, 10, 0, 0, vec![1, 2, 3], now, 1)
    }

    fn broadcast_frame(now: Instant) -> Frame<Instant> {
        Frame::new(sid(1), None, Some([7; 8]), 10, 0, 0, vec![1, 2, 3], now, 1)
    }

    #[test]
    fn enqueue_rejects_unreachable_destination_without_directory_service() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        let result = scheduler.enqueue(QueueClass::Ordinary, unicast_frame(now), false, false);
        assert!(result.is_err());
    }

    #[test]
    fn enqueue_admits_when_directory_service_reachable() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        let result = scheduler.enqueue(QueueClass::Ordinary, unicast_frame(now), false, true);
        assert!(result.is_ok());
    }

    #[test]
    fn stuff_pass_packs_matching_frames_and_removes_exhausted_unicast_frames() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        scheduler.enqueue(QueueClass::Ordinary, unicast_frame(now), true, false).unwrap();

        let plan = scheduler
            .stuff_pass(
                now,
                |_| 1400,
                |frame| frame.destination().map(|d| (0u8, Recipient::Unicast(d))),
                |_, _| {},
                |frame| frame.payload().len() + 40,
                &[],
            )
            .unwrap();

        assert_eq!(plan.interface, 0);
        assert_eq!(plan.frames.len(), 1);
        assert_eq!(scheduler.queues().len(QueueClass::Ordinary), 0);
    }

    #[test]
    fn stuff_pass_skips_frames_past_mtu() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        scheduler.enqueue(QueueClass::Ordinary, unicast_frame(now), true, false).unwrap();

        let plan = scheduler.stuff_pass(
            now,
            |_| 4,
            |frame| frame.destination().map(|d| (0u8, Recipient::Unicast(d))),
            |_, _| {},
            |frame| frame.payload().len() + 40,
            &[],
        );
        assert!(plan.is_none());
        assert_eq!(scheduler.queues().len(QueueClass::Ordinary), 1);
    }

    #[test]
    fn stuff_pass_requires_every_broadcast_interface_before_removing_frame() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        scheduler.enqueue(QueueClass::Ordinary, broadcast_frame(now), true, false).unwrap();
        let broadcast_interfaces = [0u8, 1u8];

        let resolve = |frame: &Frame<Instant>| -> Option<(InterfaceId, Recipient)> {
            broadcast_interfaces
                .iter()
                .find(|&&iface| !frame.sent_via(iface))
                .map(|&iface| (iface, Recipient::Broadcast))
        };

        let first = scheduler
            .stuff_pass(now, |_| 1400, resolve, |_, _| {}, |frame| frame.payload().len() + 40, &broadcast_interfaces)
            .unwrap();
        assert_eq!(first.interface, 0);
        // Not yet sent on interface 1, so the frame must stay queued.
        assert_eq!(scheduler.queues().len(QueueClass::Ordinary), 1);

        let second = scheduler
            .stuff_pass(now, |_| 1400, resolve, |_, _| {}, |frame| frame.payload().len() + 40, &broadcast_interfaces)
            .unwrap();
        assert_eq!(second.interface, 1);
        // Sent on every required interface now, so it's removed.
        assert_eq!(scheduler.queues().len(QueueClass::Ordinary), 0);
    }

    #[test]
    fn next_wakeup_adds_grace_period() {
        let mut scheduler = Scheduler::<Instant>::new();
        let now = Instant::now();
        scheduler.enqueue(QueueClass::Ordinary, unicast_frame(now), true, false).unwrap();

        let wakeup = scheduler
            .next_wakeup(
                now,
                |frame| frame.destination().map(|d| (0u8, Recipient::Unicast(d))),
                |_| now,
            )
            .unwrap();
        assert_eq!(wakeup, now + ALARM_GRACE);
    }
}
