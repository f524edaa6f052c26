//! Bounded polling with back-off.
//!
//! Every Controller-side wait goes through `PollPolicy::poll_until`: spin a
//! few times with `spin_loop`, then sleep `interval` between checks (or
//! yield when the interval is zero) until `timeout` expires.

use std::time::{Duration, Instant};

/// How to wait for a condition on the shared window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Busy checks before the first sleep
    pub spins: u32,
    /// Sleep between checks after spinning
    pub interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl PollPolicy {
    pub const fn new(spins: u32, interval: Duration, timeout: Duration) -> Self {
        Self { spins, interval, timeout }
    }

    /// Per-packet default: 10 ms timeout, 1 µs interval.
    pub const fn packet() -> Self {
        Self::new(64, Duration::from_micros(1), Duration::from_micros(10_000))
    }

    /// Startup rendezvous default: 30 s timeout, 1 ms interval.
    pub const fn ready() -> Self {
        Self::new(0, Duration::from_millis(1), Duration::from_secs(30))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check `cond` until it holds or the timeout expires.
    ///
    /// Returns the elapsed time either way: `Ok` when the condition was
    /// met, `Err` on timeout. The condition is always checked at least once.
    pub fn poll_until<F>(&self, mut cond: F) -> Result<Duration, Duration>
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();
        let mut checks: u32 = 0;
        loop {
            if cond() {
                return Ok(start.elapsed());
            }
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(elapsed);
            }
            if checks < self.spins {
                checks += 1;
                std::hint::spin_loop();
            } else if self.interval.is_zero() {
                std::thread::yield_now();
            } else {
                std::thread::sleep(self.interval);
            }
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_success() {
        let p = PollPolicy::new(0, Duration::from_millis(1), Duration::ZERO);
        assert!(p.poll_until(|| true).is_ok());
    }

    #[test]
    fn test_timeout() {
        let p = PollPolicy::new(4, Duration::from_micros(100), Duration::from_millis(5));
        let elapsed = p.poll_until(|| false).unwrap_err();
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_succeeds_after_spins() {
        let p = PollPolicy::new(16, Duration::ZERO, Duration::from_secs(1));
        let mut n = 0;
        assert!(p.poll_until(|| { n += 1; n == 10 }).is_ok());
        assert_eq!(n, 10);
    }
}
