//! Outbound priority queues (spec §3, §4.5).

use std::{
    collections::VecDeque,
    ops::Sub,
    time::{Duration, Instant},
};

use crate::frame::Frame;

/// Priority class a frame is enqueued under, ordered most to least
/// latency-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Real-time voice traffic.
    IsochronousVoice,
    /// Real-time video traffic.
    IsochronousVideo,
    /// Best-effort data.
    Ordinary,
    /// Routing control traffic (announcements, probes, PLEASE-EXPLAIN).
    MeshManagement,
}

/// All four classes in priority order (spec §4.5 Stuff pass walk order).
pub const ALL_CLASSES: [QueueClass; 4] =
    [QueueClass::IsochronousVoice, QueueClass::IsochronousVideo, QueueClass::Ordinary, QueueClass::MeshManagement];

impl QueueClass {
    /// Decode the wire queue-class byte (`0..=3`) into a class.
    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::IsochronousVoice,
            1 => Self::IsochronousVideo,
            3 => Self::MeshManagement,
            _ => Self::Ordinary,
        }
    }

    /// The wire queue-class byte for this class.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::IsochronousVoice => 0,
            Self::IsochronousVideo => 1,
            Self::Ordinary => 2,
            Self::MeshManagement => 3,
        }
    }
}

/// Length and latency policy for one class.
#[derive(Debug, Clone, Copy)]
struct QueuePolicy {
    max_length: usize,
    latency_target: Duration,
}

fn default_policy(class: QueueClass) -> QueuePolicy {
    match class {
        QueueClass::IsochronousVoice => {
            QueuePolicy { max_length: 20, latency_target: Duration::from_millis(200) }
        }
        QueueClass::IsochronousVideo => {
            QueuePolicy { max_length: 60, latency_target: Duration::from_millis(800) }
        }
        QueueClass::Ordinary => QueuePolicy { max_length: 200, latency_target: Duration::from_secs(30) },
        QueueClass::MeshManagement => {
            QueuePolicy { max_length: 100, latency_target: Duration::from_secs(5) }
        }
    }
}

/// One priority level's frame backlog.
#[derive(Debug)]
struct Queue<I> {
    policy: QueuePolicy,
    frames: VecDeque<Frame<I>>,
}

impl<I> Queue<I> {
    fn new(policy: QueuePolicy) -> Self {
        Self { policy, frames: VecDeque::new() }
    }
}

/// The four priority queues, keyed by [`QueueClass`].
#[derive(Debug)]
pub struct OutboundQueues<I = Instant> {
    voice: Queue<I>,
    video: Queue<I>,
    ordinary: Queue<I>,
    mesh_management: Queue<I>,
}

impl<I> Default for OutboundQueues<I> {
    fn default() -> Self {
        Self {
            voice: Queue::new(default_policy(QueueClass::IsochronousVoice)),
            video: Queue::new(default_policy(QueueClass::IsochronousVideo)),
            ordinary: Queue::new(default_policy(QueueClass::Ordinary)),
            mesh_management: Queue::new(default_policy(QueueClass::MeshManagement)),
        }
    }
}

impl<I> OutboundQueues<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build queues with the default length/latency policy per class.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_mut(&mut self, class: QueueClass) -> &mut Queue<I> {
        match class {
            QueueClass::IsochronousVoice => &mut self.voice,
            QueueClass::IsochronousVideo => &mut self.video,
            QueueClass::Ordinary => &mut self.ordinary,
            QueueClass::MeshManagement => &mut self.mesh_management,
        }
    }

    fn queue(&self, class: QueueClass) -> &Queue<I> {
        match class {
            QueueClass::IsochronousVoice => &self.voice,
            QueueClass::IsochronousVideo => &self.video,
            QueueClass::Ordinary => &self.ordinary,
            QueueClass::MeshManagement => &self.mesh_management,
        }
    }

    /// Append `frame` to `class`, dropping the oldest entry first if the
    /// queue is already at `max_length` (spec §4.5 enqueue).
    pub fn push(&mut self, class: QueueClass, frame: Frame<I>) {
        let queue = self.queue_mut(class);
        if queue.frames.len() >= queue.policy.max_length {
            queue.frames.pop_front();
        }
        queue.frames.push_back(frame);
    }

    /// Remove and drop every frame in `class` whose latency budget has
    /// expired as of `now` (spec §3, §4.5 Stuff pass step 1).
    pub fn evict_expired(&mut self, class: QueueClass, now: I) -> usize {
        let queue = self.queue_mut(class);
        let target = queue.policy.latency_target;
        let before = queue.frames.len();
        queue.frames.retain(|frame| now - frame.enqueued_at() < target);
        before - queue.frames.len()
    }

    /// Current length of `class`.
    #[must_use]
    pub fn len(&self, class: QueueClass) -> usize {
        self.queue(class).frames.len()
    }

    /// `true` if every queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        ALL_CLASSES.iter().all(|&class| self.queue(class).frames.is_empty())
    }

    /// Iterate frames in `class` in FIFO order for the stuff pass.
    pub fn iter(&self, class: QueueClass) -> impl Iterator<Item = &Frame<I>> {
        self.queue(class).frames.iter()
    }

    /// Remove the frame at `index` within `class` (used once a frame is
    /// fully sent or otherwise retired from the stuff pass).
    pub fn remove(&mut self, class: QueueClass, index: usize) -> Option<Frame<I>> {
        self.queue_mut(class).frames.remove(index)
    }

    /// Mutable access to the frame at `index` within `class`.
    pub fn get_mut(&mut self, class: QueueClass, index: usize) -> Option<&mut Frame<I>> {
        self.queue_mut(class).frames.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaymesh_proto::Sid;

    fn frame(at: Instant) -> Frame<Instant> {
        Frame::new(Sid::from_bytes([1; 32]), Some(Sid::from_bytes([2; 32])), None, 10, 0, 0, vec![], at, 1)
    }

    #[test]
    fn push_drops_oldest_when_at_capacity() {
        let mut queues = OutboundQueues::<Instant>::new();
        let now = Instant::now();
        for _ in 0..21 {
            queues.push(QueueClass::IsochronousVoice, frame(now));
        }
        assert_eq!(queues.len(QueueClass::IsochronousVoice), 20);
    }

    #[test]
    fn evict_expired_removes_only_stale_frames() {
        let mut queues = OutboundQueues::<Instant>::new();
        let t0 = Instant::now();
        queues.push(QueueClass::IsochronousVoice, frame(t0));
        let t1 = t0 + Duration::from_millis(500);
        queues.push(QueueClass::IsochronousVoice, frame(t1));

        let dropped = queues.evict_expired(QueueClass::IsochronousVoice, t1);
        assert_eq!(dropped, 1);
        assert_eq!(queues.len(QueueClass::IsochronousVoice), 1);
    }

    #[test]
    fn wire_queue_class_round_trips() {
        for class in ALL_CLASSES {
            assert_eq!(QueueClass::from_wire(class.to_wire()), class);
        }
    }
}
