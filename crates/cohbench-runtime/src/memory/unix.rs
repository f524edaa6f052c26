//! Unix mappings using nix::sys::mman

use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;

use nix::sys::mman::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};

use super::{MapError, Mapping, MappingKind};

const DEV_MEM: &str = "/dev/mem";

pub(super) fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}

pub(super) fn map_physical(base: u64, len: usize) -> Result<Mapping, MapError> {
    if len == 0 {
        return Err(MapError::Empty);
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC | libc::O_CLOEXEC)
        .open(DEV_MEM)
        .map_err(|source| MapError::Open { path: DEV_MEM, source })?;

    // mmap offsets must be page aligned
    let page = page_size() as u64;
    let aligned = base & !(page - 1);
    let lead = (base - aligned) as usize;
    let map_len = lead + len;
    let length = NonZeroUsize::new(map_len).ok_or(MapError::Empty)?;

    let raw = unsafe {
        mmap(
            None,
            length,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            &file,
            aligned as libc::off_t,
        )
    }
    .map_err(|e| MapError::Map {
        base,
        len,
        source: e.into(),
    })?;

    let map_ptr = raw.cast::<u8>();
    // SAFETY: lead < page size <= map_len
    let ptr = unsafe { NonNull::new_unchecked(map_ptr.as_ptr().add(lead)) };

    log::debug!(
        "mapped {} {:#x}..{:#x} at {:p}",
        DEV_MEM,
        base,
        base + len as u64,
        ptr
    );

    Ok(Mapping {
        ptr,
        len,
        map_ptr,
        map_len,
        kind: MappingKind::Physical { base },
    })
}

pub(super) fn map_anonymous(len: usize) -> Result<Mapping, MapError> {
    let length = NonZeroUsize::new(len).ok_or(MapError::Empty)?;

    let raw = unsafe {
        mmap_anonymous(
            None,
            length,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
        )
    }
    .map_err(|e| MapError::Map {
        base: 0,
        len,
        source: e.into(),
    })?;

    let ptr = raw.cast::<u8>();
    Ok(Mapping {
        ptr,
        len,
        map_ptr: ptr,
        map_len: len,
        kind: MappingKind::Anonymous,
    })
}

pub(super) fn unmap(ptr: NonNull<u8>, len: usize) {
    if let Err(e) = unsafe { munmap(ptr.cast(), len) } {
        log::warn!("munmap({:p}, {:#x}) failed: {}", ptr, len, e);
    }
}
