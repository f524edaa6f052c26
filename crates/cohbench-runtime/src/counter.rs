//! Free-running counters
//!
//! - `MmioCounter`: a TTC counter-value register read through a mapping of
//!   the timer's register block. Both agents read the same register.
//! - `HostCounter`: the host monotonic clock scaled to a nominal frequency
//!   and truncated to 32 bits, for the loopback harness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cohbench_core::timestamp::{self, tick_delta, FreeRunningCounter};
use cohbench_core::CohResult;

use crate::memory::{MapError, Mapping};
use crate::port::Window;

/// TTC register offsets.
pub mod ttc {
    pub const CLK_CTRL: usize = 0x00;
    pub const CNT_CTRL: usize = 0x0C;
    pub const CNT_VAL: usize = 0x18;
    /// Register block size to map.
    pub const BLOCK_SIZE: usize = 0x1000;
    /// CNT_CTRL bit 0: counter disabled
    pub const CNT_CTRL_DISABLE: u32 = 0x01;
}

/// Counter-value register of a memory-mapped timer.
#[derive(Debug, Clone)]
pub struct MmioCounter {
    regs: Window,
    frequency_hz: u32,
    max_value: u32,
}

impl MmioCounter {
    /// Map the register block at physical `base`.
    pub fn map(base: u64, frequency_hz: u32) -> Result<Self, MapError> {
        let mapping = Mapping::physical(base, ttc::BLOCK_SIZE)?;
        Ok(Self::from_mapping(Arc::new(mapping), frequency_hz))
    }

    /// Use an existing mapping of the register block.
    pub fn from_mapping(mapping: Arc<Mapping>, frequency_hz: u32) -> Self {
        Self {
            regs: Window::new(mapping),
            frequency_hz,
            max_value: u32::MAX,
        }
    }

    /// Counter width override, e.g. `0xFFFF` for a 16-bit TTC.
    pub fn with_max_value(mut self, max_value: u32) -> Self {
        self.max_value = max_value;
        self
    }

    /// Start the counter if its control register says it is disabled.
    ///
    /// Returns `true` when the counter had to be enabled.
    pub fn enable(&self) -> bool {
        let ctrl = self.regs.load_u32(ttc::CNT_CTRL);
        log::debug!("TTC counter control = {:#010x}", ctrl);
        if ctrl & ttc::CNT_CTRL_DISABLE != 0 {
            log::info!("TTC counter disabled, enabling (overflow mode, increment)");
            self.regs.store_u32(ttc::CNT_CTRL, 0);
            return true;
        }
        false
    }
}

impl FreeRunningCounter for MmioCounter {
    #[inline]
    fn now(&self) -> u32 {
        self.regs.load_u32(ttc::CNT_VAL)
    }

    #[inline]
    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    #[inline]
    fn max_value(&self) -> u32 {
        self.max_value
    }
}

/// Host monotonic clock presented as a 32-bit counter.
///
/// Clones share the origin, so two agents holding clones read one clock.
#[derive(Debug, Clone, Copy)]
pub struct HostCounter {
    origin: Instant,
    start: u32,
    frequency_hz: u32,
}

impl HostCounter {
    pub fn new(frequency_hz: u32) -> Self {
        Self::starting_at(frequency_hz, 0)
    }

    /// A counter whose first reading is `start`, e.g. just below the wrap.
    pub fn starting_at(frequency_hz: u32, start: u32) -> Self {
        Self {
            origin: Instant::now(),
            start,
            frequency_hz,
        }
    }
}

impl FreeRunningCounter for HostCounter {
    fn now(&self) -> u32 {
        let ns = self.origin.elapsed().as_nanos();
        let ticks = ns * self.frequency_hz as u128 / 1_000_000_000;
        self.start.wrapping_add(ticks as u32)
    }

    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }
}

/// Result of measuring a counter against the host clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub measured_hz: f64,
    pub configured_hz: u32,
    /// `(measured - configured) / configured`
    pub deviation: f64,
}

impl Calibration {
    pub fn within(&self, tolerance: f64) -> bool {
        self.deviation.abs() <= tolerance
    }
}

/// Deviation above which a warning is logged.
pub const CALIBRATION_TOLERANCE: f64 = 0.10;

/// Self-test the counter and estimate its rate over `window`.
///
/// Fails with `ClockStalled` if the counter does not move. A rate more than
/// 10% away from the configured frequency is logged, not rejected: both
/// agents still share the clock.
pub fn calibrate<C: FreeRunningCounter + ?Sized>(
    counter: &C,
    window: Duration,
) -> CohResult<Calibration> {
    let t0 = Instant::now();
    let (first, second) = timestamp::self_test(counter, || std::thread::sleep(window))?;
    let host = t0.elapsed();

    let ticks = tick_delta(first, second, counter.max_value());
    let measured_hz = ticks as f64 / host.as_secs_f64();
    let configured_hz = counter.frequency_hz();
    let deviation = if configured_hz == 0 {
        f64::INFINITY
    } else {
        (measured_hz - configured_hz as f64) / configured_hz as f64
    };

    let cal = Calibration { measured_hz, configured_hz, deviation };
    if cal.within(CALIBRATION_TOLERANCE) {
        log::info!(
            "counter running at {:.0} Hz (configured {} Hz)",
            measured_hz,
            configured_hz
        );
    } else {
        log::warn!(
            "counter measured at {:.0} Hz, configured {} Hz ({:+.1}%); deltas will be scaled wrong",
            measured_hz,
            configured_hz,
            deviation * 100.0
        );
    }
    Ok(cal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohbench_core::CohError;

    #[test]
    fn test_host_counter_advances() {
        let c = HostCounter::new(100_000_000);
        let a = c.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = c.now();
        assert!(tick_delta(a, b, u32::MAX) >= 100_000);
    }

    #[test]
    fn test_host_counter_wraps() {
        let c = HostCounter::starting_at(100_000_000, u32::MAX - 10);
        std::thread::sleep(Duration::from_millis(1));
        let v = c.now();
        assert!(v < 1_000_000_000, "expected wrapped value, got {}", v);
    }

    #[test]
    fn test_calibrate_host_counter() {
        let c = HostCounter::new(10_000_000);
        let cal = calibrate(&c, Duration::from_millis(20)).unwrap();
        assert_eq!(cal.configured_hz, 10_000_000);
        assert!(cal.measured_hz > 0.0);
    }

    #[test]
    fn test_mmio_counter_over_fake_registers() {
        let regs = Arc::new(Mapping::anonymous(ttc::BLOCK_SIZE).unwrap());
        let counter = MmioCounter::from_mapping(regs.clone(), 100_000_000);
        let raw = Window::new(regs);

        raw.store_u32(ttc::CNT_CTRL, ttc::CNT_CTRL_DISABLE);
        assert!(counter.enable());
        assert_eq!(raw.load_u32(ttc::CNT_CTRL), 0);
        assert!(!counter.enable());

        raw.store_u32(ttc::CNT_VAL, 1234);
        assert_eq!(counter.now(), 1234);

        // Register never moves: stalled clock.
        let err = calibrate(&counter, Duration::from_millis(1)).unwrap_err();
        assert_eq!(err, CohError::ClockStalled { first: 1234, second: 1234 });
    }
}
