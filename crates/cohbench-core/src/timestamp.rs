//! Timestamp correlation.
//!
//! Both agents read the same free-running counter. A packet's latency is
//! the modular distance from the Controller's sample (taken just before it
//! signals Process) to the Responder's sample (taken after invalidation and
//! the completion barrier). The two agents are assumed to share one clock
//! source at one frequency; nothing here verifies that beyond the startup
//! self-test.

use crate::error::{CohError, CohResult};

/// A monotonically increasing counter that wraps at `max_value()`.
pub trait FreeRunningCounter {
    /// Current counter value.
    fn now(&self) -> u32;

    /// Tick rate in Hz.
    fn frequency_hz(&self) -> u32;

    /// Largest value before the counter wraps to 0.
    fn max_value(&self) -> u32 {
        u32::MAX
    }
}

impl<C: FreeRunningCounter + ?Sized> FreeRunningCounter for &C {
    #[inline]
    fn now(&self) -> u32 {
        (**self).now()
    }
    #[inline]
    fn frequency_hz(&self) -> u32 {
        (**self).frequency_hz()
    }
    #[inline]
    fn max_value(&self) -> u32 {
        (**self).max_value()
    }
}

/// Ticks elapsed from `sender` to `receiver` on a counter wrapping at `max`.
///
/// Assumes less than one full period elapsed. Computed in 64 bits so a
/// full-range 32-bit counter cannot overflow.
#[inline]
pub const fn tick_delta(sender: u32, receiver: u32, max: u32) -> u64 {
    if receiver >= sender {
        (receiver - sender) as u64
    } else {
        (max as u64 - sender as u64) + receiver as u64 + 1
    }
}

/// Convert ticks to microseconds.
#[inline]
pub fn ticks_to_micros(ticks: u64, frequency_hz: u32) -> f64 {
    if frequency_hz == 0 {
        return 0.0;
    }
    ticks as f64 * 1_000_000.0 / frequency_hz as f64
}

/// A sender/receiver timestamp pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation {
    pub sender: u32,
    pub receiver: u32,
    pub delta: u64,
}

impl Correlation {
    pub const fn new(sender: u32, receiver: u32, max: u32) -> Self {
        Self {
            sender,
            receiver,
            delta: tick_delta(sender, receiver, max),
        }
    }

    #[inline]
    pub fn micros(&self, frequency_hz: u32) -> f64 {
        ticks_to_micros(self.delta, frequency_hz)
    }
}

/// Sample the counter twice, `delay` apart, and fail if it did not move.
///
/// `delay` must take long enough for at least one tick at the counter's
/// frequency.
pub fn self_test<C, F>(counter: &C, delay: F) -> CohResult<(u32, u32)>
where
    C: FreeRunningCounter + ?Sized,
    F: FnOnce(),
{
    let first = counter.now();
    delay();
    let second = counter.now();
    if first == second {
        log::error!("counter stalled at {:#010x}", first);
        return Err(CohError::ClockStalled { first, second });
    }
    log::debug!(
        "counter advanced {} ticks during self-test",
        tick_delta(first, second, counter.max_value())
    );
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use proptest::prelude::*;

    struct StepCounter {
        value: Cell<u32>,
        step: u32,
    }

    impl FreeRunningCounter for StepCounter {
        fn now(&self) -> u32 {
            let v = self.value.get();
            self.value.set(v.wrapping_add(self.step));
            v
        }
        fn frequency_hz(&self) -> u32 {
            100_000_000
        }
    }

    #[test]
    fn test_delta_without_wrap() {
        assert_eq!(tick_delta(100, 350, u32::MAX), 250);
        assert_eq!(tick_delta(7, 7, u32::MAX), 0);
    }

    #[test]
    fn test_delta_across_wrap() {
        assert_eq!(tick_delta(0xFFFF_FFF0, 0x0000_0010, u32::MAX), 0x20);
        assert_eq!(tick_delta(u32::MAX, 0, u32::MAX), 1);
        // 16-bit counter
        assert_eq!(tick_delta(0xFFF0, 0x0010, 0xFFFF), 0x20);
    }

    #[test]
    fn test_micros_at_100mhz() {
        let c = Correlation::new(1_000, 1_250, u32::MAX);
        assert_eq!(c.delta, 250);
        assert!((c.micros(100_000_000) - 2.5).abs() < 1e-9);
        assert_eq!(ticks_to_micros(10, 0), 0.0);
    }

    #[test]
    fn test_self_test_detects_stall() {
        let stalled = StepCounter { value: Cell::new(42), step: 0 };
        assert_eq!(
            self_test(&stalled, || {}),
            Err(CohError::ClockStalled { first: 42, second: 42 })
        );

        let running = StepCounter { value: Cell::new(u32::MAX), step: 1 };
        assert_eq!(self_test(&running, || {}), Ok((u32::MAX, 0)));
    }

    proptest! {
        #[test]
        fn prop_delta_is_modular_distance(sender: u32, elapsed in 0u32..u32::MAX) {
            let receiver = sender.wrapping_add(elapsed);
            prop_assert_eq!(tick_delta(sender, receiver, u32::MAX), elapsed as u64);
        }

        #[test]
        fn prop_delta_narrow_counter(sender in 0u32..=0xFFFF, elapsed in 0u32..0xFFFF) {
            let receiver = (sender + elapsed) & 0xFFFF;
            prop_assert_eq!(tick_delta(sender, receiver, 0xFFFF), elapsed as u64);
        }
    }
}
