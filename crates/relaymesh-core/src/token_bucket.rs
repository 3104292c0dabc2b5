//! Per-interface rate limiting (spec §4.2): a token bucket configured by
//! `(burst_size, burst_interval)`. `next_allowed` reports the earliest time
//! another packet may leave; a successful transmit consumes one token.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

/// Token bucket rate limiter, generic over the instant type so it runs
/// unmodified under a virtual clock in simulation.
#[derive(Debug, Clone)]
pub struct TokenBucket<I = Instant>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    capacity: u32,
    refill_interval: Duration,
    tokens: u32,
    last_refill: Option<I>,
}

impl<I> TokenBucket<I>
where
    I: Copy + Ord + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Build a bucket with `capacity` tokens, refilling one token every
    /// `refill_interval`. Starts full.
    #[must_use]
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self { capacity, refill_interval, tokens: capacity, last_refill: None }
    }

    fn refill(&mut self, now: I) {
        let Some(last) = self.last_refill else {
            self.last_refill = Some(now);
            return;
        };
        if self.refill_interval.is_zero() {
            self.tokens = self.capacity;
            return;
        }
        let elapsed = now - last;
        #[allow(clippy::cast_possible_truncation)]
        let gained = (elapsed.as_nanos() / self.refill_interval.as_nanos().max(1)) as u32;
        if gained > 0 {
            self.tokens = (self.tokens + gained).min(self.capacity);
            self.last_refill = Some(last + self.refill_interval * gained);
        }
    }

    /// Earliest time a packet may leave this interface, given `now`.
    pub fn next_allowed(&mut self, now: I) -> I {
        self.refill(now);
        if self.tokens > 0 { now } else { self.last_refill.unwrap_or(now) + self.refill_interval }
    }

    /// Consume one token after a successful transmit.
    pub fn consume(&mut self, now: I) {
        self.refill(now);
        self.tokens = self.tokens.saturating_sub(1);
    }

    /// Tokens currently available, for diagnostics.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_allows_immediate_send() {
        let mut bucket = TokenBucket::new(4, Duration::from_millis(100));
        let now = Instant::now();
        assert_eq!(bucket.next_allowed(now), now);
    }

    #[test]
    fn exhausting_burst_pushes_next_allowed_into_the_future() {
        let mut bucket = TokenBucket::new(2, Duration::from_millis(100));
        let t0 = Instant::now();
        bucket.consume(t0);
        bucket.consume(t0);
        assert_eq!(bucket.available(), 0);
        let allowed = bucket.next_allowed(t0);
        assert!(allowed > t0);
    }

    #[test]
    fn tokens_refill_over_time_up_to_capacity() {
        let mut bucket = TokenBucket::new(2, Duration::from_millis(100));
        let t0 = Instant::now();
        bucket.consume(t0);
        bucket.consume(t0);
        let t1 = t0 + Duration::from_millis(250);
        assert_eq!(bucket.next_allowed(t1), t1);
        assert_eq!(bucket.available(), 2);
    }
}
