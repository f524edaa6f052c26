//! Memory port abstraction.
//!
//! A `MemoryPort` is one agent's view of the shared window: volatile loads
//! and stores at byte offsets, plus the cache maintenance that view needs.
//!
//! # Implementors (in `cohbench-runtime`)
//!
//! - `UncachedPort`: direct volatile access (`/dev/mem` with `O_SYNC`).
//!   Maintenance is a no-op, `barrier` is a full fence.
//! - `CachedPort`: volatile access plus the architecture's invalidate /
//!   clean-by-address instructions.
//! - `SimCachedPort`: a software write-back cache over a shared mapping,
//!   for single-address-space tests. Stale lines stay stale until
//!   invalidated, writes stay private until flushed.
//!
//! Protocol code never calls a port directly; it goes through
//! [`SharedAccess`](crate::access::SharedAccess), which owns the ordering
//! rules.

/// How an agent's view of the window relates to backing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheModel {
    /// Every access reaches backing memory
    Uncached,
    /// Accesses go through a write-back data cache that is not kept
    /// consistent with the other agent
    WriteBack,
}

/// One agent's view of the shared window.
///
/// **Contract:**
/// - Offsets are relative to the start of the window and must lie within
///   `len()`. Implementations panic on out-of-range access.
/// - `invalidate` discards the local copy of every line overlapping the
///   range; the next load re-fetches from backing memory.
/// - `flush` writes back every dirty line overlapping the range.
/// - Both return only after the operation has retired for that range.
/// - `barrier` orders all earlier loads, stores and maintenance before any
///   later one (DSB SY / MFENCE).
pub trait MemoryPort {
    /// Size of the window in bytes.
    fn len(&self) -> usize;

    fn load_u32(&self, offset: usize) -> u32;
    fn store_u32(&self, offset: usize, value: u32);

    fn load_bytes(&self, offset: usize, dst: &mut [u8]);
    fn store_bytes(&self, offset: usize, src: &[u8]);

    fn invalidate(&self, offset: usize, len: usize);
    fn flush(&self, offset: usize, len: usize);
    fn barrier(&self);

    fn cache_model(&self) -> CacheModel;

    /// Fill `[offset, offset + len)` with `byte`.
    fn fill(&self, offset: usize, len: usize, byte: u8) {
        let chunk = [byte; 256];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(chunk.len());
            self.store_bytes(offset + done, &chunk[..n]);
            done += n;
        }
    }
}

impl<P: MemoryPort + ?Sized> MemoryPort for &P {
    #[inline]
    fn len(&self) -> usize {
        (**self).len()
    }
    #[inline]
    fn load_u32(&self, offset: usize) -> u32 {
        (**self).load_u32(offset)
    }
    #[inline]
    fn store_u32(&self, offset: usize, value: u32) {
        (**self).store_u32(offset, value)
    }
    #[inline]
    fn load_bytes(&self, offset: usize, dst: &mut [u8]) {
        (**self).load_bytes(offset, dst)
    }
    #[inline]
    fn store_bytes(&self, offset: usize, src: &[u8]) {
        (**self).store_bytes(offset, src)
    }
    #[inline]
    fn invalidate(&self, offset: usize, len: usize) {
        (**self).invalidate(offset, len)
    }
    #[inline]
    fn flush(&self, offset: usize, len: usize) {
        (**self).flush(offset, len)
    }
    #[inline]
    fn barrier(&self) {
        (**self).barrier()
    }
    #[inline]
    fn cache_model(&self) -> CacheModel {
        (**self).cache_model()
    }
}
