//! # cohbench-runtime
//!
//! Platform-specific runtime for the coherence benchmark.
//!
//! This crate provides:
//! - Cache maintenance instructions per architecture (`arch`)
//! - `/dev/mem` and anonymous shared mappings (`memory`)
//! - `MemoryPort` implementations: uncached, cached, simulated (`port`)
//! - Free-running counters and clock calibration (`counter`)
//! - Environment-driven configuration (`config`)
//! - An in-process Controller/Responder loopback (`loopback`)

pub mod arch;
pub mod config;
pub mod counter;
pub mod loopback;
pub mod memory;
pub mod port;

// Re-exports
pub use config::{BenchConfig, ConfigError};
pub use counter::{calibrate, Calibration, HostCounter, MmioCounter};
pub use loopback::{Loopback, LoopbackError, LoopbackOptions, ResponderView, SleepDelay};
pub use memory::{MapError, Mapping};
pub use port::{CachedPort, SimCacheStats, SimCachedPort, UncachedPort};
