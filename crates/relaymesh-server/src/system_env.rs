//! Production [`Environment`] using system time and OS-provided RNG.

use std::time::Duration;

use relaymesh_core::env::Environment;

/// Production environment: `std::time::Instant` for time, `tokio::time::sleep`
/// for the scheduler's wakeups, and the OS CSPRNG for randomness.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. A node that cannot source
/// randomness cannot generate broadcast-ids or eviction rolls and should not
/// continue running.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Build a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS RNG failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn time_advances() {
        let env = SystemEnv::new();
        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(env.now() > t1);
    }

    #[test]
    fn random_bytes_fill_the_buffer() {
        let env = SystemEnv::new();
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
