//! # cohbench - Software-Managed Cache Coherence Benchmark
//!
//! Measures the latency of handing a payload from a Controller, which sees
//! a shared memory window uncached, to a bare-metal Responder, which sees
//! the same window through a non-coherent write-back cache.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cohbench::{run_sweep, write_csv, Loopback, LoopbackOptions, Quiet, SweepPlan};
//!
//! let config = cohbench::BenchConfig::from_env();
//! let lb = Loopback::spawn(LoopbackOptions::default(), config.controller_policy())?;
//! let plan = SweepPlan::for_layout(&config.layout, config.iterations);
//! let summary = run_sweep(lb.controller(), &plan, &mut Quiet)?;
//! write_csv(&summary.results, &config.output)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   Controller (OS, uncached)                 Responder (bare metal, cached)
//!  ┌──────────────────────────┐              ┌──────────────────────────┐
//!  │ orchestrator / report    │              │ Responder::run           │
//!  │ Controller::send_packet  │              │ invalidate ─ stamp ─ log │
//!  └────────────┬─────────────┘              └────────────┬─────────────┘
//!               │ publish / read_remote          flush /  │ invalidate
//!               ▼                                         ▼
//!  ┌──────────────────────────────────────────────────────────────────┐
//!  │ Control (2 lines) │ Payload ........ │ Results (count + entries) │
//!  └──────────────────────────────────────────────────────────────────┘
//!                  shared window, one free-running counter
//! ```

pub mod orchestrator;
pub mod report;
pub mod session;

// Re-export core types
pub use cohbench_core::{
    Acknowledgement,
    CohError,
    CohResult,
    Command,
    Controller,
    ControllerPolicy,
    Drained,
    FreeRunningCounter,
    MemoryPort,
    PollPolicy,
    RegionLayout,
    Responder,
    ResponderReport,
    ResultEntry,
    SharedAccess,
    Status,
};
pub use cohbench_core::probe::{run_probe, ProbeCounts, PATTERN_NEW, PATTERN_OLD};

// Re-export env utilities
pub use cohbench_core::{env_get, env_get_hex, env_get_opt, env_get_str};

// Re-export runtime types
pub use cohbench_runtime::{
    BenchConfig,
    ConfigError,
    HostCounter,
    Loopback,
    LoopbackError,
    LoopbackOptions,
    Mapping,
    MmioCounter,
    ResponderView,
    SimCachedPort,
    UncachedPort,
};

pub use orchestrator::{
    fill_pattern, run_sweep, Progress, Quiet, ResultSet, Sample, SizeStats, SizeTally, SweepError,
    SweepPlan, SweepSummary, DDR_SIZES, TCM_SIZES,
};
pub use report::{generate_csv, render_table, write_csv, CSV_HEADER};
pub use session::{HardwareSession, SessionError};
