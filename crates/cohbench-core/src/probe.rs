//! Stale-read probe.
//!
//! Measures what a cached reader observes after the other agent overwrites
//! a word: seed `PATTERN_OLD`, let the reader cache it, publish
//! `PATTERN_NEW`, then sample the word repeatedly. Without invalidation a
//! non-coherent reader keeps returning the old pattern.

use crate::access::SharedAccess;
use crate::port::MemoryPort;

/// Value sitting in memory before the update.
pub const PATTERN_OLD: u32 = 0x0F0F_0F0F;

/// Value written by the updating agent.
pub const PATTERN_NEW: u32 = 0xF0F0_F0F0;

/// Tally of observed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCounts {
    pub reads: u32,
    pub old: u32,
    pub new: u32,
    pub other: u32,
}

impl ProbeCounts {
    pub fn record(&mut self, value: u32) {
        self.reads += 1;
        match value {
            PATTERN_OLD => self.old += 1,
            PATTERN_NEW => self.new += 1,
            _ => self.other += 1,
        }
    }

    /// Fraction of pattern reads that saw the update, `None` if neither
    /// pattern was seen.
    pub fn coherency_rate(&self) -> Option<f64> {
        let seen = self.old + self.new;
        if seen == 0 {
            None
        } else {
            Some(self.new as f64 / seen as f64)
        }
    }
}

/// Sample the word at `offset` `reads` times through `reader`.
///
/// With `invalidate` every sample re-fetches the line first.
pub fn stale_read_probe<P: MemoryPort>(
    reader: &SharedAccess<P>,
    offset: usize,
    reads: u32,
    invalidate: bool,
) -> ProbeCounts {
    let mut counts = ProbeCounts::default();
    for _ in 0..reads {
        let value = if invalidate {
            reader.read_remote_u32(offset)
        } else {
            reader.load_u32(offset)
        };
        counts.record(value);
    }
    counts
}

/// Full scenario: seed, warm the reader, update through `writer`, sample.
pub fn run_probe<W: MemoryPort, R: MemoryPort>(
    writer: &SharedAccess<W>,
    reader: &SharedAccess<R>,
    offset: usize,
    reads: u32,
    invalidate: bool,
) -> ProbeCounts {
    writer.publish_u32(offset, PATTERN_OLD);
    let warm = reader.read_remote_u32(offset);
    if warm != PATTERN_OLD {
        log::warn!("reader saw {:#010x} after seeding, expected old pattern", warm);
    }

    writer.publish_u32(offset, PATTERN_NEW);
    let counts = stale_read_probe(reader, offset, reads, invalidate);
    log::debug!(
        "probe: {} reads, {} old, {} new, {} other",
        counts.reads,
        counts.old,
        counts.new,
        counts.other
    );
    counts
}
