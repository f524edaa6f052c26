//! Cached view with hardware line maintenance.

use std::sync::Arc;

use cohbench_core::port::{CacheModel, MemoryPort};

use super::Window;
use crate::arch;
use crate::memory::Mapping;

/// Volatile access through the data cache, with `invalidate`/`flush`
/// issuing the architecture's by-address line operations.
#[derive(Clone, Debug)]
pub struct CachedPort {
    window: Window,
    line: usize,
}

impl CachedPort {
    /// `line` is the hardware cache line size and must be a power of two.
    pub fn new(mapping: Arc<Mapping>, line: usize) -> Self {
        assert!(line.is_power_of_two(), "cache line {} is not a power of two", line);
        log::debug!("cached port using {} maintenance, {}-byte lines", arch::BACKEND, line);
        Self {
            window: Window::new(mapping),
            line,
        }
    }

    #[inline]
    fn check_range(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.window.len()),
            "maintenance {:#x}+{:#x} outside window",
            offset,
            len
        );
    }
}

impl MemoryPort for CachedPort {
    #[inline]
    fn len(&self) -> usize {
        self.window.len()
    }

    #[inline]
    fn load_u32(&self, offset: usize) -> u32 {
        self.window.load_u32(offset)
    }

    #[inline]
    fn store_u32(&self, offset: usize, value: u32) {
        self.window.store_u32(offset, value)
    }

    #[inline]
    fn load_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.window.load_bytes(offset, dst)
    }

    #[inline]
    fn store_bytes(&self, offset: usize, src: &[u8]) {
        self.window.store_bytes(offset, src)
    }

    fn invalidate(&self, offset: usize, len: usize) {
        self.check_range(offset, len);
        unsafe { arch::invalidate_range(self.window.addr(offset), len, self.line) }
    }

    fn flush(&self, offset: usize, len: usize) {
        self.check_range(offset, len);
        unsafe { arch::clean_range(self.window.addr(offset), len, self.line) }
    }

    #[inline]
    fn barrier(&self) {
        arch::barrier();
    }

    fn cache_model(&self) -> CacheModel {
        CacheModel::WriteBack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maintenance_keeps_data_on_host() {
        let port = CachedPort::new(Arc::new(Mapping::anonymous(8192).unwrap()), 64);
        port.store_u32(128, 0xC0FF_EE00);
        port.flush(128, 4);
        port.barrier();
        port.invalidate(128, 4);
        assert_eq!(port.load_u32(128), 0xC0FF_EE00);
        assert_eq!(port.cache_model(), CacheModel::WriteBack);
    }
}
