//! # cohbench-core
//!
//! Core types and protocol state machines for measuring software-managed
//! cache coherence between a Controller (OS-hosted, uncached view of the
//! shared window) and a Responder (bare-metal, write-back cached view).
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Cache-maintenance instructions, mappings and counters live in
//! `cohbench-runtime`. With `default-features = false` the crate is
//! `no_std`, so the Responder firmware can link the same layout and
//! protocol code the Controller uses.
//!
//! ## Modules
//!
//! - `layout` - Static offsets of Control / Payload / Results
//! - `control` - Command and status words of the mailbox
//! - `port` - `MemoryPort` trait: volatile access plus cache maintenance
//! - `access` - `SharedAccess`, the read-with-invalidate / write-with-flush layer
//! - `timestamp` - Free-running counters and wraparound-safe deltas
//! - `results` - Fixed-capacity results log and its drain
//! - `mailbox` - Responder and Controller sides of the protocol
//! - `poll` - Bounded polling with back-off (std)
//! - `probe` - Stale-read probe
//! - `error` - Error types
//! - `env` - Environment variable utilities (std)

#![cfg_attr(not(feature = "std"), no_std)]

pub mod layout;
pub mod control;
pub mod port;
pub mod access;
pub mod timestamp;
pub mod results;
pub mod mailbox;
pub mod probe;
pub mod error;

#[cfg(feature = "std")]
pub mod poll;
#[cfg(feature = "std")]
pub mod env;

// The build script's layout-file parser, compiled here so its tests run.
#[cfg(all(test, feature = "std"))]
#[path = "../layout_file.rs"]
mod layout_file;

// Re-exports for convenience
pub use layout::{line_span, LineSpan, RegionLayout};
pub use control::{Command, Status};
pub use port::{CacheModel, MemoryPort};
pub use access::SharedAccess;
pub use timestamp::{tick_delta, ticks_to_micros, Correlation, FreeRunningCounter};
pub use results::{ResultEntry, ResultsLog, RESULT_MARKER};
pub use mailbox::responder::{PollDelay, Responder, ResponderReport, SpinDelay, Step};
pub use error::{CohError, CohResult};

#[cfg(feature = "std")]
pub use mailbox::controller::{Acknowledgement, Controller, ControllerPolicy};
#[cfg(feature = "std")]
pub use poll::PollPolicy;
#[cfg(feature = "std")]
pub use results::{drain, Drained};
#[cfg(feature = "std")]
pub use env::{env_get, env_get_hex, env_get_opt, env_get_str};
