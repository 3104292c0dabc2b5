//! Interface data model (spec §3, §4.2).
//!
//! The core only tracks what routing and scheduling decisions need —
//! kind, state, MTU, tick cadence and rate limit. Socket binding, the
//! SLIP/file transport codecs, and actual I/O live in `relaymesh-server`;
//! this module's [`Interface`] is what that driver reports into the core
//! and what the core hands back out in send decisions.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use crate::token_bucket::TokenBucket;

/// Local interface number, as carried on the wire (spec §4.1 envelope
/// `interface_number`).
pub type InterfaceId = u8;

/// Interface medium, used to prefer one candidate interface over another
/// when a destination is reachable on more than one (spec §4.2
/// Comparator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    /// Long-range, high-latency packet radio link.
    PacketRadio,
    /// Medium not otherwise classified.
    Unknown,
    /// 802.11 wireless.
    Wifi,
    /// Wired Ethernet.
    Ethernet,
}

impl InterfaceKind {
    fn priority(self) -> u8 {
        match self {
            Self::PacketRadio => 0,
            Self::Unknown => 1,
            Self::Wifi => 2,
            Self::Ethernet => 3,
        }
    }
}

impl PartialOrd for InterfaceKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InterfaceKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

/// Transport encapsulation this interface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// UDP-style datagram socket: one ensemble per send/receive.
    Dgram,
    /// Byte-stream socket requiring SLIP-like framing.
    Stream,
    /// Shared regular file used as an append-only record log.
    File,
}

/// Interface lifecycle state (spec §4.2 State machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    /// Not bound / not currently usable.
    Down,
    /// Re-validation in progress during a discovery sweep.
    Detecting,
    /// Bound and usable.
    Up,
}

/// One configured or discovered interface.
#[derive(Debug, Clone)]
pub struct Interface<I = Instant>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    id: InterfaceId,
    name: String,
    kind: InterfaceKind,
    state: InterfaceState,
    socket_type: SocketType,
    mtu: usize,
    /// `None` means tickless (no periodic self-announcement).
    tick_interval: Option<Duration>,
    rate_limit: TokenBucket<I>,
    permits_broadcast: bool,
}

impl<I> Interface<I>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Construct a new, initially `Down` interface.
    #[must_use]
    pub fn new(
        id: InterfaceId,
        name: impl Into<String>,
        kind: InterfaceKind,
        socket_type: SocketType,
        mtu: usize,
        tick_interval: Option<Duration>,
        rate_limit: TokenBucket<I>,
        permits_broadcast: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            state: InterfaceState::Down,
            socket_type,
            mtu,
            tick_interval,
            rate_limit,
            permits_broadcast,
        }
    }

    /// Default tick interval for a newly discovered interface of `kind`
    /// (spec §4.2: 500ms for wifi/ethernet, 15s for packet-radio, tickless
    /// otherwise).
    #[must_use]
    pub fn default_tick_interval(kind: InterfaceKind) -> Option<Duration> {
        match kind {
            InterfaceKind::Ethernet | InterfaceKind::Wifi => Some(Duration::from_millis(500)),
            InterfaceKind::PacketRadio => Some(Duration::from_secs(15)),
            InterfaceKind::Unknown => None,
        }
    }

    /// Interface number.
    #[must_use]
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    /// Interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Medium.
    #[must_use]
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> InterfaceState {
        self.state
    }

    /// Transport encapsulation.
    #[must_use]
    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// Maximum transmission unit in bytes.
    #[must_use]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Self-announcement tick cadence, `None` if tickless.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_interval
    }

    /// `true` if this interface is UP and can carry broadcasts.
    #[must_use]
    pub fn can_broadcast(&self) -> bool {
        self.state == InterfaceState::Up && self.permits_broadcast
    }

    /// `true` if this interface is usable for sending at all.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.state == InterfaceState::Up
    }

    /// Mark UP (spec: on successful bind and poll-register).
    pub fn mark_up(&mut self) {
        self.state = InterfaceState::Up;
    }

    /// Mark DETECTING (start of a discovery sweep).
    pub fn mark_detecting(&mut self) {
        if self.state == InterfaceState::Up {
            self.state = InterfaceState::Detecting;
        }
    }

    /// Mark DOWN (poll HUP/ERR, explicit teardown, or not re-observed
    /// during a discovery sweep).
    pub fn mark_down(&mut self) {
        self.state = InterfaceState::Down;
    }

    /// Mutable access to this interface's rate limiter.
    pub fn rate_limit_mut(&mut self) -> &mut TokenBucket<I> {
        &mut self.rate_limit
    }

    /// Read-only access to this interface's rate limiter.
    #[must_use]
    pub fn rate_limit(&self) -> &TokenBucket<I> {
        &self.rate_limit
    }
}
