//! Mailbox protocol
//!
//! One packet in flight. The Controller writes `command`, the Responder
//! writes `status`:
//!
//! ```text
//!              Process                    (record)
//!   Ready ─────────────────▶ Busy ───────────────────▶ Done
//!     ▲                                                  │
//!     └──────────────────── Idle ◀───────────────────────┘
//!
//!   any ── Shutdown ──▶ flush results ──▶ Done (terminal)
//! ```
//!
//! The Controller waits for `Ready` before every `Process` or `Shutdown`.
//! The Responder only acts on `Process` while its own status is `Ready`, so
//! a command word left at `Process` is never processed twice.

pub mod responder;

#[cfg(feature = "std")]
pub mod controller;
