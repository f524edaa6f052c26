//! No line operations available: fences only.

use std::sync::atomic::{fence, Ordering};

pub const NAME: &str = "fence-only";

#[inline(always)]
pub unsafe fn invalidate_line(_addr: usize) {
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub unsafe fn clean_line(_addr: usize) {
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub fn barrier() {
    fence(Ordering::SeqCst);
}
