//! Shared region layout
//!
//! Both agents address the shared window through the same static offsets:
//!
//! ```text
//! 0                      line             2*line                results_offset
//! ┌──────────────────────┬────────────────┬──────────────────┬──┬──────────────────────────┐
//! │ command size sndr_ts │ status rcvr_ts │ payload ...      │  │ count │ entry[0] entry.. │
//! │ (Controller writes)  │ (Responder)    │ (max_payload)    │  │ (Responder writes)       │
//! └──────────────────────┴────────────────┴──────────────────┴──┴──────────────────────────┘
//! ```
//!
//! Each control line has exactly one writer, so flushing one agent's line
//! never writes back a stale copy of the other agent's field.
//!
//! The layout an agent is built with comes from `build.rs` (library
//! defaults merged with `COHBENCH_LAYOUT_RS`). A mismatch between the two
//! agents' builds is not detectable at runtime.

use crate::error::{CohError, CohResult};
use crate::results::{ENTRY_SIZE, HEADER_SIZE};

/// Build-time layout constants.
pub mod defaults {
    include!(concat!(env!("OUT_DIR"), "/cohbench_layout.rs"));
}

/// Byte offsets of the Controller-owned fields within control line 0.
pub mod field {
    pub const COMMAND: usize = 0;
    pub const SIZE: usize = 4;
    pub const SENDER_TS: usize = 8;

    /// Offsets of the Responder-owned fields relative to control line 1.
    pub const STATUS: usize = 0;
    pub const RECEIVER_TS: usize = 4;
}

/// Number of cache lines reserved for the control block.
pub const CONTROL_LINES: usize = 2;

/// Static description of the shared window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    /// Total window size in bytes
    pub region_size: usize,
    /// Cache maintenance granularity
    pub cache_line: usize,
    /// Largest payload a packet may carry
    pub max_payload: usize,
    /// Offset of the results header word
    pub results_offset: usize,
    /// Capacity of the results log
    pub max_results: usize,
}

const _: () = assert!(
    RegionLayout::BUILD.validate().is_ok(),
    "invalid region layout, check COHBENCH_LAYOUT_RS"
);

impl RegionLayout {
    /// The layout this build was configured with.
    pub const BUILD: Self = Self::new(
        defaults::REGION_SIZE,
        defaults::CACHE_LINE_SIZE,
        defaults::MAX_PAYLOAD,
        defaults::RESULTS_OFFSET,
        defaults::MAX_RESULTS,
    );

    /// 8 MiB DDR window, results at 4 MiB.
    pub const DDR: Self = Self::new(0x0080_0000, 64, 64 * 1024, 0x0040_0000, 10_000);

    /// 64 KiB tightly-coupled memory window, results at 8 KiB.
    pub const TCM: Self = Self::new(0x0001_0000, 64, 4 * 1024, 0x2000, 1_000);

    pub const fn new(
        region_size: usize,
        cache_line: usize,
        max_payload: usize,
        results_offset: usize,
        max_results: usize,
    ) -> Self {
        Self {
            region_size,
            cache_line,
            max_payload,
            results_offset,
            max_results,
        }
    }

    /// Check the layout for overlaps and alignment errors.
    pub const fn validate(&self) -> Result<(), &'static str> {
        if self.cache_line < 16 || !self.cache_line.is_power_of_two() {
            return Err("cache line must be a power of two >= 16");
        }
        if self.max_payload == 0 || self.max_payload > u32::MAX as usize {
            return Err("max payload must be in 1..=u32::MAX");
        }
        if self.max_results == 0 || self.max_results > u32::MAX as usize {
            return Err("max results must be in 1..=u32::MAX");
        }
        if self.results_offset % self.cache_line != 0 {
            return Err("results offset must be cache-line aligned");
        }
        if self.payload_offset() + self.max_payload > self.results_offset {
            return Err("control + payload overlap the results area");
        }
        if self.results_offset + self.results_len() > self.region_size {
            return Err("results area overflows the region");
        }
        Ok(())
    }

    /// `validate` as a `CohResult`.
    pub fn check(&self) -> CohResult<()> {
        self.validate().map_err(CohError::InvalidLayout)
    }

    // ── Control block ──

    #[inline]
    pub const fn command_offset(&self) -> usize {
        field::COMMAND
    }

    #[inline]
    pub const fn size_offset(&self) -> usize {
        field::SIZE
    }

    #[inline]
    pub const fn sender_ts_offset(&self) -> usize {
        field::SENDER_TS
    }

    #[inline]
    pub const fn status_offset(&self) -> usize {
        self.cache_line + field::STATUS
    }

    #[inline]
    pub const fn receiver_ts_offset(&self) -> usize {
        self.cache_line + field::RECEIVER_TS
    }

    /// The line written only by the Controller.
    #[inline]
    pub const fn controller_line(&self) -> LineSpan {
        LineSpan { start: 0, len: self.cache_line }
    }

    /// The line written only by the Responder.
    #[inline]
    pub const fn responder_line(&self) -> LineSpan {
        LineSpan { start: self.cache_line, len: self.cache_line }
    }

    // ── Payload ──

    #[inline]
    pub const fn payload_offset(&self) -> usize {
        CONTROL_LINES * self.cache_line
    }

    // ── Results ──

    #[inline]
    pub const fn results_header_offset(&self) -> usize {
        self.results_offset
    }

    /// Offset of entry `index`. Entries are packed right after the header word.
    #[inline]
    pub const fn entry_offset(&self, index: usize) -> usize {
        self.results_offset + HEADER_SIZE + index * ENTRY_SIZE
    }

    /// Bytes of a full results area (header + every slot).
    #[inline]
    pub const fn results_len(&self) -> usize {
        HEADER_SIZE + self.max_results * ENTRY_SIZE
    }

    /// Bytes actually holding data when `count` entries were written.
    #[inline]
    pub const fn results_used(&self, count: usize) -> usize {
        HEADER_SIZE + count * ENTRY_SIZE
    }

    /// Expand `[offset, offset + len)` to whole lines of this layout.
    #[inline]
    pub const fn line_span(&self, offset: usize, len: usize) -> LineSpan {
        line_span(offset, len, self.cache_line)
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self::BUILD
    }
}

/// A cache-line aligned byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of cache lines covered.
    #[inline]
    pub const fn lines(&self, line: usize) -> usize {
        self.len / line
    }
}

/// Round `[offset, offset + len)` out to `line`-aligned bounds.
///
/// A zero-length range covers no lines. `line` must be a power of two.
#[inline]
pub const fn line_span(offset: usize, len: usize, line: usize) -> LineSpan {
    let mask = line - 1;
    let start = offset & !mask;
    if len == 0 {
        return LineSpan { start, len: 0 };
    }
    let end = (offset + len + mask) & !mask;
    LineSpan { start, len: end - start }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(RegionLayout::BUILD.validate().is_ok());
        assert!(RegionLayout::DDR.validate().is_ok());
        assert!(RegionLayout::TCM.validate().is_ok());
    }

    #[test]
    fn test_control_lines_are_disjoint() {
        let l = RegionLayout::TCM;
        let ctrl = l.controller_line();
        let resp = l.responder_line();
        assert_eq!(ctrl.end(), resp.start);
        assert!(l.sender_ts_offset() + 4 <= ctrl.end());
        assert!(l.status_offset() >= resp.start && l.receiver_ts_offset() + 4 <= resp.end());
        assert_eq!(l.payload_offset(), resp.end());
    }

    #[test]
    fn test_entry_offsets() {
        let l = RegionLayout::DDR;
        assert_eq!(l.entry_offset(0), 0x0040_0004);
        assert_eq!(l.entry_offset(2), 0x0040_0004 + 40);
        assert_eq!(l.results_used(3), 4 + 60);
        assert_eq!(l.results_len(), 4 + 10_000 * 20);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let l = RegionLayout::new(0x1_0000, 64, 0x2000, 0x2000, 10);
        assert_eq!(l.validate(), Err("control + payload overlap the results area"));

        let l = RegionLayout::new(0x2100, 64, 1024, 0x2000, 100);
        assert_eq!(l.validate(), Err("results area overflows the region"));

        let l = RegionLayout::new(0x1_0000, 48, 1024, 0x2000, 100);
        assert!(l.validate().is_err());

        let l = RegionLayout::new(0x1_0000, 64, 1024, 0x2010, 100);
        assert_eq!(l.validate(), Err("results offset must be cache-line aligned"));
    }

    #[test]
    fn test_check_maps_error() {
        let l = RegionLayout::new(0x100, 64, 1024, 0x2000, 10);
        assert!(matches!(l.check(), Err(CohError::InvalidLayout(_))));
    }

    #[test]
    fn test_line_span() {
        assert_eq!(line_span(128, 1, 64), LineSpan { start: 128, len: 64 });
        assert_eq!(line_span(128, 64, 64), LineSpan { start: 128, len: 64 });
        assert_eq!(line_span(128, 65, 64), LineSpan { start: 128, len: 128 });
        assert_eq!(line_span(130, 62, 64), LineSpan { start: 128, len: 64 });
        assert_eq!(line_span(130, 63, 64), LineSpan { start: 128, len: 128 });
        assert!(line_span(200, 0, 64).is_empty());
        assert_eq!(line_span(128, 4096, 64).lines(64), 64);
    }
}
