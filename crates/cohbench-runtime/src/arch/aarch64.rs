//! AArch64 data cache maintenance.
//!
//! `dc ivac` is EL1-only; at EL0 Linux permits `dc civac` and `dc cvac`
//! (SCTLR_EL1.UCI), so invalidation here also cleans the line.

use core::arch::asm;

pub const NAME: &str = "aarch64-dc";

#[inline(always)]
pub unsafe fn invalidate_line(addr: usize) {
    asm!("dc civac, {0}", in(reg) addr, options(nostack, preserves_flags));
}

#[inline(always)]
pub unsafe fn clean_line(addr: usize) {
    asm!("dc cvac, {0}", in(reg) addr, options(nostack, preserves_flags));
}

#[inline(always)]
pub fn barrier() {
    unsafe {
        asm!("dsb sy", options(nostack, preserves_flags));
    }
}
