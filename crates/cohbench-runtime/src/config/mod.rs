//! Benchmark configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Command-line flags (applied by the binary through the builder)
//! 2. Environment variables (runtime)
//! 3. Library defaults (`defaults.rs`)
//!
//! The region layout is not configured here: it is fixed at build time by
//! `COHBENCH_LAYOUT_RS` (see `cohbench_core::layout`). The builder only
//! picks among compiled-in presets.
//!
//! # Example
//!
//! ```rust,ignore
//! use cohbench_runtime::config::BenchConfig;
//!
//! let config = BenchConfig::from_env()
//!     .iterations(10)
//!     .packet_timeout(Duration::from_millis(5));
//! config.validate()?;
//! ```

pub mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use cohbench_core::env::{env_get, env_get_hex, env_get_str};
use cohbench_core::{ControllerPolicy, PollPolicy, RegionLayout};
use thiserror::Error;

/// Benchmark configuration with builder pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Packets per payload size
    pub iterations: u32,
    /// Physical base of the shared window
    pub phys_base: u64,
    /// Physical base of the timer register block
    pub timer_base: u64,
    /// Counter frequency shared by both agents
    pub timer_freq_hz: u32,
    /// Wait for Ready/Done around one packet
    pub packet_timeout: Duration,
    /// Wait for the first Ready
    pub ready_timeout: Duration,
    /// Wait for the Shutdown acknowledgement
    pub shutdown_timeout: Duration,
    /// Sleep between polls after spinning
    pub poll_interval: Duration,
    /// Busy polls before sleeping
    pub poll_spins: u32,
    /// Gap between consecutive packets
    pub inter_packet_delay: Duration,
    /// CSV export path
    pub output: PathBuf,
    /// Region layout both agents were built with
    pub layout: RegionLayout,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BenchConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `COHBENCH_ITERATIONS` - Packets per payload size
    /// - `COHBENCH_PHYS_BASE` - Shared window base (hex or decimal)
    /// - `COHBENCH_TIMER_BASE` - TTC register block base (hex or decimal)
    /// - `COHBENCH_TIMER_FREQ_HZ` - Counter frequency
    /// - `COHBENCH_PACKET_TIMEOUT_US` - Per-packet timeout
    /// - `COHBENCH_READY_TIMEOUT_MS` - Startup rendezvous timeout
    /// - `COHBENCH_SHUTDOWN_TIMEOUT_MS` - Shutdown acknowledgement timeout
    /// - `COHBENCH_POLL_INTERVAL_US` - Sleep between polls
    /// - `COHBENCH_POLL_SPINS` - Busy polls before sleeping
    /// - `COHBENCH_INTER_PACKET_DELAY_US` - Gap between packets
    /// - `COHBENCH_OUTPUT` - CSV export path
    pub fn from_env() -> Self {
        Self {
            iterations: env_get("COHBENCH_ITERATIONS", defaults::ITERATIONS),
            phys_base: env_get_hex("COHBENCH_PHYS_BASE", defaults::PHYS_BASE),
            timer_base: env_get_hex("COHBENCH_TIMER_BASE", defaults::TIMER_BASE),
            timer_freq_hz: env_get("COHBENCH_TIMER_FREQ_HZ", defaults::TIMER_FREQ_HZ),
            packet_timeout: Duration::from_micros(env_get(
                "COHBENCH_PACKET_TIMEOUT_US",
                defaults::PACKET_TIMEOUT_US,
            )),
            ready_timeout: Duration::from_millis(env_get(
                "COHBENCH_READY_TIMEOUT_MS",
                defaults::READY_TIMEOUT_MS,
            )),
            shutdown_timeout: Duration::from_millis(env_get(
                "COHBENCH_SHUTDOWN_TIMEOUT_MS",
                defaults::SHUTDOWN_TIMEOUT_MS,
            )),
            poll_interval: Duration::from_micros(env_get(
                "COHBENCH_POLL_INTERVAL_US",
                defaults::POLL_INTERVAL_US,
            )),
            poll_spins: env_get("COHBENCH_POLL_SPINS", defaults::POLL_SPINS),
            inter_packet_delay: Duration::from_micros(env_get(
                "COHBENCH_INTER_PACKET_DELAY_US",
                defaults::INTER_PACKET_DELAY_US,
            )),
            output: PathBuf::from(env_get_str("COHBENCH_OUTPUT", defaults::OUTPUT)),
            layout: RegionLayout::BUILD,
        }
    }

    /// Create config with library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            iterations: defaults::ITERATIONS,
            phys_base: defaults::PHYS_BASE,
            timer_base: defaults::TIMER_BASE,
            timer_freq_hz: defaults::TIMER_FREQ_HZ,
            packet_timeout: Duration::from_micros(defaults::PACKET_TIMEOUT_US),
            ready_timeout: Duration::from_millis(defaults::READY_TIMEOUT_MS),
            shutdown_timeout: Duration::from_millis(defaults::SHUTDOWN_TIMEOUT_MS),
            poll_interval: Duration::from_micros(defaults::POLL_INTERVAL_US),
            poll_spins: defaults::POLL_SPINS,
            inter_packet_delay: Duration::from_micros(defaults::INTER_PACKET_DELAY_US),
            output: PathBuf::from(defaults::OUTPUT),
            layout: RegionLayout::BUILD,
        }
    }

    // Builder methods

    pub fn iterations(mut self, n: u32) -> Self {
        self.iterations = n;
        self
    }

    pub fn phys_base(mut self, base: u64) -> Self {
        self.phys_base = base;
        self
    }

    pub fn timer_base(mut self, base: u64) -> Self {
        self.timer_base = base;
        self
    }

    pub fn timer_freq_hz(mut self, hz: u32) -> Self {
        self.timer_freq_hz = hz;
        self
    }

    pub fn packet_timeout(mut self, d: Duration) -> Self {
        self.packet_timeout = d;
        self
    }

    pub fn ready_timeout(mut self, d: Duration) -> Self {
        self.ready_timeout = d;
        self
    }

    pub fn shutdown_timeout(mut self, d: Duration) -> Self {
        self.shutdown_timeout = d;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn poll_spins(mut self, spins: u32) -> Self {
        self.poll_spins = spins;
        self
    }

    pub fn inter_packet_delay(mut self, d: Duration) -> Self {
        self.inter_packet_delay = d;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn layout(mut self, layout: RegionLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Wait bounds for the Controller.
    pub fn controller_policy(&self) -> ControllerPolicy {
        let packet = PollPolicy::new(self.poll_spins, self.poll_interval, self.packet_timeout);
        let ready_interval = self.poll_interval.max(Duration::from_millis(1));
        ControllerPolicy {
            packet,
            ready: PollPolicy::new(0, ready_interval, self.ready_timeout),
            shutdown: packet.with_timeout(self.shutdown_timeout),
        }
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidValue("iterations must be > 0"));
        }
        if self.timer_freq_hz == 0 {
            return Err(ConfigError::InvalidValue("timer_freq_hz must be > 0"));
        }
        if self.packet_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("packet_timeout must be > 0"));
        }
        if self.ready_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("ready_timeout must be > 0"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("shutdown_timeout must be > 0"));
        }
        if self.phys_base % 4096 != 0 {
            return Err(ConfigError::InvalidValue("phys_base must be page aligned"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("output path must not be empty"));
        }
        self.layout.validate().map_err(ConfigError::InvalidValue)?;
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("cohbench configuration:");
        eprintln!("  iterations:          {}", self.iterations);
        eprintln!("  phys_base:           {:#010x}", self.phys_base);
        eprintln!("  timer_base:          {:#010x}", self.timer_base);
        eprintln!("  timer_freq_hz:       {}", self.timer_freq_hz);
        eprintln!("  packet_timeout:      {:?}", self.packet_timeout);
        eprintln!("  ready_timeout:       {:?}", self.ready_timeout);
        eprintln!("  shutdown_timeout:    {:?}", self.shutdown_timeout);
        eprintln!("  poll_interval:       {:?}", self.poll_interval);
        eprintln!("  poll_spins:          {}", self.poll_spins);
        eprintln!("  inter_packet_delay:  {:?}", self.inter_packet_delay);
        eprintln!("  output:              {}", self.output.display());
        eprintln!("  region_size:         {:#x}", self.layout.region_size);
        eprintln!("  max_payload:         {}", self.layout.max_payload);
        eprintln!("  results_offset:      {:#x}", self.layout.results_offset);
        eprintln!("  max_results:         {}", self.layout.max_results);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}
