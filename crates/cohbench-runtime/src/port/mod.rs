//! `MemoryPort` implementations
//!
//! - `UncachedPort`: volatile access, maintenance no-ops (Controller)
//! - `CachedPort`: volatile access plus `arch` line operations
//! - `SimCachedPort`: software write-back cache over a shared mapping,
//!   for exercising the protocol on a coherent host

mod cached;
mod sim_cache;
mod uncached;

pub use cached::CachedPort;
pub use sim_cache::{SimCacheStats, SimCachedPort};
pub use uncached::UncachedPort;

use std::ptr;
use std::sync::Arc;

use crate::memory::Mapping;

/// Bounds-checked volatile access to a mapping.
///
/// Word accesses must be 4-byte aligned. Byte copies use aligned word
/// accesses where they can, since device-typed mappings fault on
/// unaligned access.
#[derive(Clone, Debug)]
pub(crate) struct Window {
    mapping: Arc<Mapping>,
}

impl Window {
    pub(crate) fn new(mapping: Arc<Mapping>) -> Self {
        Self { mapping }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.mapping.len()
    }

    #[inline]
    pub(crate) fn addr(&self, offset: usize) -> usize {
        self.mapping.as_ptr() as usize + offset
    }

    #[inline]
    fn check(&self, offset: usize, len: usize) {
        let in_range = offset
            .checked_add(len)
            .is_some_and(|end| end <= self.mapping.len());
        assert!(
            in_range,
            "access {:#x}+{:#x} outside {:#x}-byte window",
            offset,
            len,
            self.mapping.len()
        );
    }

    #[inline]
    pub(crate) fn load_u32(&self, offset: usize) -> u32 {
        self.check(offset, 4);
        debug_assert_eq!(offset % 4, 0, "unaligned word load at {:#x}", offset);
        unsafe { ptr::read_volatile(self.mapping.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    pub(crate) fn store_u32(&self, offset: usize, value: u32) {
        self.check(offset, 4);
        debug_assert_eq!(offset % 4, 0, "unaligned word store at {:#x}", offset);
        unsafe { ptr::write_volatile(self.mapping.as_ptr().add(offset) as *mut u32, value) }
    }

    pub(crate) fn load_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.check(offset, dst.len());
        let base = self.mapping.as_ptr();
        let mut i = 0;
        while i < dst.len() {
            let at = offset + i;
            if at % 4 == 0 && dst.len() - i >= 4 {
                let w = unsafe { ptr::read_volatile(base.add(at) as *const u32) };
                dst[i..i + 4].copy_from_slice(&w.to_ne_bytes());
                i += 4;
            } else {
                dst[i] = unsafe { ptr::read_volatile(base.add(at)) };
                i += 1;
            }
        }
    }

    pub(crate) fn store_bytes(&self, offset: usize, src: &[u8]) {
        self.check(offset, src.len());
        let base = self.mapping.as_ptr();
        let mut i = 0;
        while i < src.len() {
            let at = offset + i;
            if at % 4 == 0 && src.len() - i >= 4 {
                let w = u32::from_ne_bytes([src[i], src[i + 1], src[i + 2], src[i + 3]]);
                unsafe { ptr::write_volatile(base.add(at) as *mut u32, w) };
                i += 4;
            } else {
                unsafe { ptr::write_volatile(base.add(at), src[i]) };
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaligned_byte_copy() {
        let w = Window::new(Arc::new(Mapping::anonymous(4096).unwrap()));
        let src: Vec<u8> = (0..37u8).collect();
        w.store_bytes(3, &src);
        let mut dst = vec![0u8; 37];
        w.load_bytes(3, &mut dst);
        assert_eq!(dst, src);
        assert_eq!(w.load_u32(4) & 0xFF, 1);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_out_of_range_panics() {
        let w = Window::new(Arc::new(Mapping::anonymous(4096).unwrap()));
        w.load_u32(4096);
    }
}
