//! x86_64 cache maintenance.
//!
//! The hardware is coherent; `clflush` still evicts the line so the cached
//! path pays a realistic refill cost.

use core::arch::asm;

pub const NAME: &str = "x86_64-clflush";

#[inline(always)]
pub unsafe fn invalidate_line(addr: usize) {
    asm!("clflush [{}]", in(reg) addr, options(nostack));
}

#[inline(always)]
pub unsafe fn clean_line(addr: usize) {
    asm!("clflush [{}]", in(reg) addr, options(nostack));
}

#[inline(always)]
pub fn barrier() {
    unsafe {
        asm!("mfence", options(nostack));
    }
}
