//! Results log
//!
//! A fixed-capacity array of 20-byte entries after a 4-byte count word,
//! written only by the Responder:
//!
//! ```text
//! results_offset: count │ entry[0] │ entry[1] │ ... │ entry[max_results - 1]
//! entry:          packet_size │ sender_ts │ receiver_ts │ delta_ticks │ marker
//! ```
//!
//! The running count lives in Responder memory. The count word is written
//! once, by `finalize`, after the entries it covers have been flushed, so a
//! Controller that reads count N can trust entries `0..N`.

use crate::access::SharedAccess;
use crate::layout::RegionLayout;
use crate::port::MemoryPort;
use crate::timestamp::Correlation;

/// Marker word of a fully written entry.
pub const RESULT_MARKER: u32 = 0xA5A5_A5A5;

/// Size of the count word.
pub const HEADER_SIZE: usize = 4;

/// Size of one packed entry.
pub const ENTRY_SIZE: usize = 5 * 4;

/// One recorded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultEntry {
    pub packet_size: u32,
    pub sender_ts: u32,
    pub receiver_ts: u32,
    pub delta_ticks: u32,
    pub marker: u32,
}

impl ResultEntry {
    /// A marked entry for a packet of `packet_size` bytes.
    pub fn new(packet_size: u32, correlation: Correlation) -> Self {
        Self {
            packet_size,
            sender_ts: correlation.sender,
            receiver_ts: correlation.receiver,
            delta_ticks: correlation.delta as u32,
            marker: RESULT_MARKER,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.marker == RESULT_MARKER
    }

    fn store<P: MemoryPort>(&self, access: &SharedAccess<P>, offset: usize) {
        let words = [
            self.packet_size,
            self.sender_ts,
            self.receiver_ts,
            self.delta_ticks,
            self.marker,
        ];
        for (i, w) in words.iter().enumerate() {
            access.store_u32(offset + i * 4, *w);
        }
    }

    fn load<P: MemoryPort>(access: &SharedAccess<P>, offset: usize) -> Self {
        Self {
            packet_size: access.load_u32(offset),
            sender_ts: access.load_u32(offset + 4),
            receiver_ts: access.load_u32(offset + 8),
            delta_ticks: access.load_u32(offset + 12),
            marker: access.load_u32(offset + 16),
        }
    }
}

/// Responder-side writer for the results area.
#[derive(Debug)]
pub struct ResultsLog {
    count: usize,
    dropped: usize,
    capacity: usize,
}

impl ResultsLog {
    pub fn new(layout: &RegionLayout) -> Self {
        Self {
            count: 0,
            dropped: 0,
            capacity: layout.max_results,
        }
    }

    /// Zero the whole results area and write it back.
    pub fn reset<P: MemoryPort>(&mut self, access: &SharedAccess<P>) {
        let layout = access.layout();
        access.fill(layout.results_header_offset(), layout.results_len(), 0);
        access.flush_range(layout.results_header_offset(), layout.results_len());
        access.complete();
        self.count = 0;
        self.dropped = 0;
    }

    /// Record `entry`. Returns `false` and counts a drop when full.
    ///
    /// The entry is written to local memory only; `finalize` makes it
    /// visible.
    pub fn append<P: MemoryPort>(&mut self, access: &SharedAccess<P>, entry: &ResultEntry) -> bool {
        if self.count >= self.capacity {
            self.dropped += 1;
            return false;
        }
        entry.store(access, access.layout().entry_offset(self.count));
        self.count += 1;
        true
    }

    /// Write back the entries, then publish the count.
    ///
    /// Flushes exactly the lines covering `header + count * ENTRY_SIZE`.
    pub fn finalize<P: MemoryPort>(&self, access: &SharedAccess<P>) {
        let layout = access.layout();
        access.flush_range(layout.entry_offset(0), self.count * ENTRY_SIZE);
        access.complete();
        access.store_u32(layout.results_header_offset(), self.count as u32);
        access.flush_range(layout.results_header_offset(), HEADER_SIZE);
        access.complete();
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }
}

/// Entries read back by the Controller.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Default)]
pub struct Drained {
    /// Entries with a valid marker, in slot order
    pub entries: Vec<ResultEntry>,
    /// Count word as published
    pub reported: usize,
    /// Slots skipped for a bad marker
    pub discarded: usize,
    /// `reported` exceeded capacity and was clamped
    pub clamped: bool,
}

/// Read the published results.
///
/// Invalidates the header, reads the count, clamps it to capacity,
/// invalidates the entries and keeps those whose marker checks out.
#[cfg(feature = "std")]
pub fn drain<P: MemoryPort>(access: &SharedAccess<P>) -> Drained {
    let layout = access.layout();
    let reported = access.read_remote_u32(layout.results_header_offset()) as usize;

    let count = if reported > layout.max_results {
        log::warn!(
            "results header reports {} entries, capacity is {}; clamping",
            reported,
            layout.max_results
        );
        layout.max_results
    } else {
        reported
    };

    access.invalidate_range(layout.entry_offset(0), count * ENTRY_SIZE);
    access.complete();

    let mut drained = Drained {
        entries: Vec::with_capacity(count),
        reported,
        discarded: 0,
        clamped: count != reported,
    };

    for i in 0..count {
        let entry = ResultEntry::load(access, layout.entry_offset(i));
        if entry.is_valid() {
            drained.entries.push(entry);
        } else {
            log::warn!("result slot {} has marker {:#010x}, discarding", i, entry.marker);
            drained.discarded += 1;
        }
    }

    log::debug!(
        "drained {} entries ({} discarded)",
        drained.entries.len(),
        drained.discarded
    );
    drained
}
