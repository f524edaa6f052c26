//! ARMv7-A/R (Cortex-R5 class) data cache maintenance via CP15.

use core::arch::asm;

pub const NAME: &str = "arm-cp15";

/// DCIMVAC: invalidate data cache line by MVA to PoC.
#[inline(always)]
pub unsafe fn invalidate_line(addr: usize) {
    asm!(
        "mcr p15, 0, {mva}, c7, c6, 1",
        mva = in(reg) addr,
        options(nostack, preserves_flags),
    );
}

/// DCCMVAC: clean data cache line by MVA to PoC.
#[inline(always)]
pub unsafe fn clean_line(addr: usize) {
    asm!(
        "mcr p15, 0, {mva}, c7, c10, 1",
        mva = in(reg) addr,
        options(nostack, preserves_flags),
    );
}

#[inline(always)]
pub fn barrier() {
    unsafe {
        asm!("dsb", options(nostack, preserves_flags));
    }
}
