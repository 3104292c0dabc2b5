//! Environment abstraction for deterministic testing.
//!
//! Decouples the overlay core from time and randomness so the same state
//! machines run unmodified under a real clock/RNG in production and under
//! a virtual clock/seeded RNG in the simulation harness.

use std::{
    ops::Add,
    time::Duration,
};

/// Abstract environment providing time and randomness to the overlay core.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards.
/// - `random_bytes()` is cryptographically secure in production; seeded
///   and reproducible in simulation.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment. Production uses
    /// `std::time::Instant`; the simulation harness uses a virtual
    /// equivalent.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::ops::Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for `duration`. The only async method on this trait; driver
    /// code uses it to wait for the scheduler's next wakeup, never the
    /// core's own state-machine methods.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u32`, e.g. for a slot-eviction index.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// Generates an 8-byte broadcast-id (spec §3).
    fn random_broadcast_id(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        bytes
    }
}
