//! Architecture-specific cache maintenance
//!
//! Each backend provides by-address line operations and a full barrier:
//!
//! | target    | invalidate              | clean (write back)      | barrier  |
//! |-----------|-------------------------|-------------------------|----------|
//! | `arm`     | `mcr p15 c7,c6,1` DCIMVAC | `mcr p15 c7,c10,1` DCCMVAC | `dsb`  |
//! | `aarch64` | `dc civac`              | `dc cvac`               | `dsb sy` |
//! | `x86_64`  | `clflush`               | `clflush`               | `mfence` |
//! | other     | fence                   | fence                   | fence    |

cfg_if::cfg_if! {
    if #[cfg(feature = "fence-only")] {
        mod fallback;
        use fallback as imp;
    } else if #[cfg(target_arch = "arm")] {
        mod arm;
        use arm as imp;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        use aarch64 as imp;
    } else if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        use x86_64 as imp;
    } else {
        mod fallback;
        use fallback as imp;
    }
}

/// Name of the selected backend.
pub const BACKEND: &str = imp::NAME;

/// Full completion barrier.
#[inline]
pub fn barrier() {
    imp::barrier();
}

/// Invalidate every `line`-sized line overlapping `[addr, addr + len)`.
///
/// # Safety
///
/// The range must be mapped. On `arm` an invalidate discards dirty data in
/// the lines, so the caller must own no unflushed writes there.
#[inline]
pub unsafe fn invalidate_range(addr: usize, len: usize, line: usize) {
    for_each_line(addr, len, line, |a| imp::invalidate_line(a));
}

/// Write back every `line`-sized line overlapping `[addr, addr + len)`.
///
/// # Safety
///
/// The range must be mapped.
#[inline]
pub unsafe fn clean_range(addr: usize, len: usize, line: usize) {
    for_each_line(addr, len, line, |a| imp::clean_line(a));
}

#[inline]
fn for_each_line<F: FnMut(usize)>(addr: usize, len: usize, line: usize, mut op: F) {
    if len == 0 {
        return;
    }
    let mut a = addr & !(line - 1);
    let end = addr + len;
    while a < end {
        op(a);
        a += line;
    }
}
