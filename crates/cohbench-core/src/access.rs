//! Cache-discipline access layer.
//!
//! Every protocol module reads and writes the shared window through
//! `SharedAccess`, which applies the maintenance rules:
//!
//! - read a remote-written field: invalidate its line(s), then load
//! - publish a field the remote reads: store, flush its line(s), barrier
//! - before a timestamp or a signal: `complete()` (full barrier)
//!
//! Ranges are expanded to whole cache lines. On an uncached port the
//! maintenance calls are no-ops but the barriers are still issued.

use crate::error::{CohError, CohResult};
use crate::layout::{LineSpan, RegionLayout};
use crate::port::{CacheModel, MemoryPort};

/// A port bound to a layout.
pub struct SharedAccess<P> {
    port: P,
    layout: RegionLayout,
}

impl<P: MemoryPort> SharedAccess<P> {
    /// Bind `port` to `layout`. Fails if the layout is inconsistent or the
    /// window is smaller than the layout.
    pub fn new(port: P, layout: RegionLayout) -> CohResult<Self> {
        layout.check()?;
        if port.len() < layout.region_size {
            return Err(CohError::RegionTooSmall {
                required: layout.region_size,
                actual: port.len(),
            });
        }
        Ok(Self { port, layout })
    }

    #[inline]
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn cache_model(&self) -> CacheModel {
        self.port.cache_model()
    }

    // ── Remote-written fields ──

    /// Invalidate the line holding `offset`, then load the word.
    #[inline]
    pub fn read_remote_u32(&self, offset: usize) -> u32 {
        self.invalidate_range(offset, 4);
        self.port.load_u32(offset)
    }

    /// Store a word the other agent reads, flush its line and barrier.
    #[inline]
    pub fn publish_u32(&self, offset: usize, value: u32) {
        self.port.store_u32(offset, value);
        self.flush_range(offset, 4);
        self.port.barrier();
    }

    /// Store bytes the other agent reads, flush their lines and barrier.
    pub fn publish_bytes(&self, offset: usize, src: &[u8]) {
        self.port.store_bytes(offset, src);
        self.flush_range(offset, src.len());
        self.port.barrier();
    }

    // ── Local access (caller handles maintenance) ──

    #[inline]
    pub fn load_u32(&self, offset: usize) -> u32 {
        self.port.load_u32(offset)
    }

    #[inline]
    pub fn store_u32(&self, offset: usize, value: u32) {
        self.port.store_u32(offset, value)
    }

    #[inline]
    pub fn load_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.port.load_bytes(offset, dst)
    }

    #[inline]
    pub fn store_bytes(&self, offset: usize, src: &[u8]) {
        self.port.store_bytes(offset, src)
    }

    #[inline]
    pub fn fill(&self, offset: usize, len: usize, byte: u8) {
        self.port.fill(offset, len, byte)
    }

    // ── Maintenance ──

    /// Invalidate every line overlapping `[offset, offset + len)`.
    #[inline]
    pub fn invalidate_range(&self, offset: usize, len: usize) {
        let span = self.layout.line_span(offset, len);
        self.invalidate_span(span);
    }

    /// Write back every line overlapping `[offset, offset + len)`.
    #[inline]
    pub fn flush_range(&self, offset: usize, len: usize) {
        let span = self.layout.line_span(offset, len);
        self.flush_span(span);
    }

    #[inline]
    pub fn invalidate_span(&self, span: LineSpan) {
        if !span.is_empty() {
            self.port.invalidate(span.start, span.len);
        }
    }

    #[inline]
    pub fn flush_span(&self, span: LineSpan) {
        if !span.is_empty() {
            self.port.flush(span.start, span.len);
        }
    }

    /// Completion barrier: all earlier accesses and maintenance retire
    /// before anything after it.
    #[inline]
    pub fn complete(&self) {
        self.port.barrier();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{TracePort, VecPort};
    use super::*;

    #[test]
    fn test_new_rejects_small_window() {
        let port = VecPort::new(0x1000);
        let err = SharedAccess::new(port, RegionLayout::TCM).err();
        assert_eq!(
            err,
            Some(CohError::RegionTooSmall { required: 0x1_0000, actual: 0x1000 })
        );
    }

    #[test]
    fn test_read_remote_invalidates_first() {
        let layout = RegionLayout::TCM;
        let access = SharedAccess::new(TracePort::new(layout.region_size), layout).unwrap();
        access.read_remote_u32(layout.status_offset());
        assert_eq!(
            access.port().ops(),
            vec![("invalidate", 64, 64), ("load", 64, 4)]
        );
    }

    #[test]
    fn test_publish_flushes_then_barriers() {
        let layout = RegionLayout::TCM;
        let access = SharedAccess::new(TracePort::new(layout.region_size), layout).unwrap();
        access.publish_u32(layout.command_offset(), 1);
        assert_eq!(
            access.port().ops(),
            vec![("store", 0, 4), ("flush", 0, 64), ("barrier", 0, 0)]
        );
    }

    #[test]
    fn test_zero_length_range_is_skipped() {
        let layout = RegionLayout::TCM;
        let access = SharedAccess::new(TracePort::new(layout.region_size), layout).unwrap();
        access.invalidate_range(layout.payload_offset(), 0);
        access.flush_range(layout.payload_offset(), 0);
        assert!(access.port().ops().is_empty());
    }

    #[test]
    fn test_payload_span_is_line_rounded() {
        let layout = RegionLayout::TCM;
        let access = SharedAccess::new(TracePort::new(layout.region_size), layout).unwrap();
        access.invalidate_range(layout.payload_offset(), 65);
        assert_eq!(access.port().ops(), vec![("invalidate", 128, 128)]);
    }
}
