//! Mappings of the shared window
//!
//! - `Mapping::physical` maps a physical range through `/dev/mem` opened
//!   with `O_SYNC`, which Linux maps uncached. This is the Controller's
//!   view on the target.
//! - `Mapping::anonymous` is a `MAP_SHARED` anonymous region, used as the
//!   backing memory of the in-process loopback.
//!
//! Platform-specific implementations live in submodules.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
    }
}

use std::ptr::NonNull;

use thiserror::Error;

/// Errors creating a mapping.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("mmap of {len:#x} bytes at {base:#x} failed: {source}")]
    Map {
        base: u64,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping length must be non-zero")]
    Empty,

    #[error("memory mappings are not supported on this platform")]
    Unsupported,
}

/// Where a mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MappingKind {
    /// `/dev/mem` window at a physical address
    Physical { base: u64 },
    /// Anonymous shared memory
    Anonymous,
}

/// An owned mapping, unmapped on drop.
///
/// `ptr` points at the first requested byte; `map_ptr`/`map_len` describe
/// the page-aligned region actually mapped.
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
    map_ptr: NonNull<u8>,
    map_len: usize,
    kind: MappingKind,
}

// The mapping is plain memory shared by design; ports built on it apply
// their own access discipline.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Map `len` bytes of physical memory starting at `base`.
    pub fn physical(base: u64, len: usize) -> Result<Self, MapError> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                unix::map_physical(base, len)
            } else {
                let _ = (base, len);
                Err(MapError::Unsupported)
            }
        }
    }

    /// Map `len` bytes of zeroed anonymous shared memory.
    pub fn anonymous(len: usize) -> Result<Self, MapError> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                unix::map_anonymous(len)
            } else {
                let _ = len;
                Err(MapError::Unsupported)
            }
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        #[cfg(unix)]
        unix::unmap(self.map_ptr, self.map_len);
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Mapping");
        d.field("ptr", &self.ptr).field("len", &self.len);
        match self.kind {
            MappingKind::Physical { base } => d.field("phys_base", &format_args!("{:#x}", base)),
            MappingKind::Anonymous => d.field("anonymous", &true),
        };
        d.finish()
    }
}

/// System page size.
pub fn page_size() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            unix::page_size()
        } else {
            4096
        }
    }
}
