//! In-memory frame representation (spec §3) — the unit the scheduler
//! enqueues, packs into outgoing packets, and eventually retires.

use std::time::Instant;

use relaymesh_proto::Sid;

use crate::interface::InterfaceId;

/// Maximum TTL (spec §6).
pub const MAX_TTL: u8 = 31;

/// Maximum queue class (spec §3/§6).
pub const MAX_QUEUE: u8 = 3;

/// Maximum `send_copies` a frame may be enqueued with (spec §4.5).
pub const MAX_SEND_COPIES: u8 = 5;

/// One outbound or to-be-forwarded unit of work.
///
/// Broadcast fan-out over interfaces is tracked with a bitmap rather than
/// the original's per-interface flag array — `InterfaceId` is a small u8,
/// so a `u32` bitmap covers any realistic interface count without a heap
/// allocation.
#[derive(Debug, Clone)]
pub struct Frame<I = Instant> {
    source: Sid,
    destination: Option<Sid>,
    next_hop: Option<Sid>,
    broadcast_id: Option<[u8; 8]>,
    ttl: u8,
    queue: u8,
    frame_type: u8,
    payload: Vec<u8>,
    enqueued_at: I,
    send_copies: u8,
    destination_resolved: bool,
    broadcast_sent_via: u32,
}

impl<I: Copy> Frame<I> {
    /// Build a new frame. `ttl` and `queue` are clamped to their wire
    /// maxima; `send_copies` is clamped to `[1, MAX_SEND_COPIES]`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Sid,
        destination: Option<Sid>,
        broadcast_id: Option<[u8; 8]>,
        ttl: u8,
        queue: u8,
        frame_type: u8,
        payload: Vec<u8>,
        enqueued_at: I,
        send_copies: u8,
    ) -> Self {
        Self {
            source,
            destination,
            next_hop: None,
            broadcast_id,
            ttl: ttl.min(MAX_TTL),
            queue: queue.min(MAX_QUEUE),
            frame_type,
            payload,
            enqueued_at,
            send_copies: send_copies.clamp(1, MAX_SEND_COPIES),
            destination_resolved: false,
            broadcast_sent_via: 0,
        }
    }

    /// Originating subscriber.
    #[must_use]
    pub fn source(&self) -> Sid {
        self.source
    }

    /// Destination subscriber; `None` means broadcast.
    #[must_use]
    pub fn destination(&self) -> Option<Sid> {
        self.destination
    }

    /// `true` if this frame has no specific destination.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_none()
    }

    /// Resolved next-hop, set once destination resolution succeeds.
    #[must_use]
    pub fn next_hop(&self) -> Option<Sid> {
        self.next_hop
    }

    /// Set the resolved next-hop and mark resolution complete.
    pub fn resolve(&mut self, next_hop: Sid) {
        self.next_hop = Some(next_hop);
        self.destination_resolved = true;
    }

    /// Mark a broadcast frame as resolved: it goes out on an interface's
    /// link-layer broadcast, with no specific next-hop.
    pub fn mark_broadcast_resolved(&mut self) {
        self.destination_resolved = true;
    }

    /// `true` once `resolve` has been called.
    #[must_use]
    pub fn destination_resolved(&self) -> bool {
        self.destination_resolved
    }

    /// Broadcast id, present only for broadcast frames.
    #[must_use]
    pub fn broadcast_id(&self) -> Option<[u8; 8]> {
        self.broadcast_id
    }

    /// Remaining hop count.
    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Decrement TTL by one on receive (spec §4.1). Saturates at 0.
    pub fn decrement_ttl(&mut self) {
        self.ttl = self.ttl.saturating_sub(1);
    }

    /// Priority class, `0..=MAX_QUEUE`.
    #[must_use]
    pub fn queue(&self) -> u8 {
        self.queue
    }

    /// Wire frame type.
    #[must_use]
    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// Opaque payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Time this frame was enqueued.
    #[must_use]
    pub fn enqueued_at(&self) -> I {
        self.enqueued_at
    }

    /// Remaining unicast copies to send.
    #[must_use]
    pub fn send_copies(&self) -> u8 {
        self.send_copies
    }

    /// Decrement the unicast copy count by one. Saturates at 0.
    pub fn consume_copy(&mut self) {
        self.send_copies = self.send_copies.saturating_sub(1);
    }

    /// Mark this frame sent on broadcast interface `iface`.
    pub fn mark_sent_via(&mut self, iface: InterfaceId) {
        self.broadcast_sent_via |= 1u32 << (iface as u32 % 32);
    }

    /// `true` if this frame was already sent on broadcast interface
    /// `iface`.
    #[must_use]
    pub fn sent_via(&self, iface: InterfaceId) -> bool {
        self.broadcast_sent_via & (1u32 << (iface as u32 % 32)) != 0
    }

    /// `true` once this frame has no remaining work: unicast copies are
    /// exhausted, or every interface in `required` has been broadcast on
    /// (spec §3 Frame destruction condition (a)).
    #[must_use]
    pub fn is_exhausted(&self, required: &[InterfaceId]) -> bool {
        if self.is_broadcast() {
            required.iter().all(|&iface| self.sent_via(iface))
        } else {
            self.send_copies == 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sid(b: u8) -> Sid {
        Sid::from_bytes([b; 32])
    }

    #[test]
    fn constructor_clamps_ttl_queue_and_copies() {
        let frame = Frame::new(sid(1), Some(sid(2)), None, 99, 9, 0, vec![], Instant::now(), 0);
        assert_eq!(frame.ttl(), MAX_TTL);
        assert_eq!(frame.queue(), MAX_QUEUE);
        assert_eq!(frame.send_copies(), 1);
    }

    #[test]
    fn unicast_frame_exhausts_after_copies_consumed() {
        let mut frame = Frame::new(sid(1), Some(sid(2)), None, 10, 0, 0, vec![], Instant::now(), 1);
        assert!(!frame.is_exhausted(&[]));
        frame.consume_copy();
        assert!(frame.is_exhausted(&[]));
    }

    #[test]
    fn broadcast_frame_exhausts_once_every_required_interface_is_marked() {
        let mut frame = Frame::new(sid(1), None, Some([1; 8]), 10, 0, 0, vec![], Instant::now(), 1);
        assert!(!frame.is_exhausted(&[0, 1]));
        frame.mark_sent_via(0);
        assert!(!frame.is_exhausted(&[0, 1]));
        frame.mark_sent_via(1);
        assert!(frame.is_exhausted(&[0, 1]));
    }

    #[test]
    fn decrement_ttl_saturates_at_zero() {
        let mut frame = Frame::new(sid(1), Some(sid(2)), None, 0, 0, 0, vec![], Instant::now(), 1);
        frame.decrement_ttl();
        assert_eq!(frame.ttl(), 0);
    }
}
