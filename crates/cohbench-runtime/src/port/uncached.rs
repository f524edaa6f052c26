//! Uncached view of the window.

use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use cohbench_core::port::{CacheModel, MemoryPort};

use super::Window;
use crate::memory::Mapping;

/// Direct volatile access. Every access reaches memory, so invalidate and
/// flush do nothing; `barrier` is a sequentially consistent fence.
#[derive(Clone, Debug)]
pub struct UncachedPort {
    window: Window,
}

impl UncachedPort {
    pub fn new(mapping: Arc<Mapping>) -> Self {
        Self { window: Window::new(mapping) }
    }
}

impl MemoryPort for UncachedPort {
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

    #[inline]
    fn invalidate(&self, _offset: usize, _len: usize) {}

    #[inline]
    fn flush(&self, _offset: usize, _len: usize) {}

    #[inline]
    fn barrier(&self) {
        fence(Ordering::SeqCst);
    }

    fn cache_model(&self) -> CacheModel {
        CacheModel::Uncached
    }
}
