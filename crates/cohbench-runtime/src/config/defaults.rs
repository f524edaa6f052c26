//! Library defaults for `BenchConfig`.
//!
//! Addresses and timing match the DDR build of the benchmark on a
//! Zynq UltraScale+ (APU Controller, RPU Responder).

/// Packets sent per payload size
pub const ITERATIONS: u32 = 100;

/// Physical base of the shared window
pub const PHYS_BASE: u64 = 0x3E00_0000;

/// Physical base of the TTC0 register block
pub const TIMER_BASE: u64 = 0xFF11_0000;

/// TTC0 input clock
pub const TIMER_FREQ_HZ: u32 = 100_000_000;

/// Wait for Done after each Process
pub const PACKET_TIMEOUT_US: u64 = 10_000;

/// Wait for the Responder's first Ready
pub const READY_TIMEOUT_MS: u64 = 30_000;

/// Wait for Done after Shutdown
pub const SHUTDOWN_TIMEOUT_MS: u64 = 100;

/// Sleep between status checks once spinning is exhausted
pub const POLL_INTERVAL_US: u64 = 1;

/// Status checks before the first sleep
pub const POLL_SPINS: u32 = 64;

/// Gap between packets
pub const INTER_PACKET_DELAY_US: u64 = 100;

/// CSV export path
pub const OUTPUT: &str = "cohbench_results.csv";
