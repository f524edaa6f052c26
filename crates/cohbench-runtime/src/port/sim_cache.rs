//! Software model of a non-coherent write-back data cache.
//!
//! Sits between one agent and a shared mapping. Loads allocate lines from
//! backing memory and keep hitting them until invalidated; stores write
//! into the cached line and only reach backing memory on `flush`. An
//! invalidate discards the line, dirty or not, as DCIMVAC does.
//!
//! This lets the loopback harness reproduce stale reads and lost writes on
//! a host whose real caches are coherent.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use cohbench_core::port::{CacheModel, MemoryPort};

use super::Window;
use crate::memory::Mapping;

struct Line {
    data: Box<[u8]>,
    dirty: bool,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writebacks: u64,
    /// Dirty lines thrown away by an invalidate
    pub discarded: u64,
}

/// Write-back cache over a shared mapping. Not `Sync`: one agent owns it.
pub struct SimCachedPort {
    backing: Window,
    line: usize,
    lines: RefCell<HashMap<usize, Line>>,
    stats: Cell<SimCacheStats>,
}

impl SimCachedPort {
    pub fn new(mapping: Arc<Mapping>, line: usize) -> Self {
        assert!(line.is_power_of_two() && line >= 4, "bad cache line size {}", line);
        Self {
            backing: Window::new(mapping),
            line,
            lines: RefCell::new(HashMap::new()),
            stats: Cell::new(SimCacheStats::default()),
        }
    }

    pub fn stats(&self) -> SimCacheStats {
        self.stats.get()
    }

    /// Lines currently held.
    pub fn resident_lines(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn dirty_lines(&self) -> usize {
        self.lines.borrow().values().filter(|l| l.dirty).count()
    }

    fn bump<F: FnOnce(&mut SimCacheStats)>(&self, f: F) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    #[inline]
    fn line_base(&self, offset: usize) -> usize {
        offset & !(self.line - 1)
    }

    fn check(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.backing.len()),
            "access {:#x}+{:#x} outside {:#x}-byte window",
            offset,
            len,
            self.backing.len()
        );
    }

    /// Run `f` on each (line, range-within-line, range-within-buffer) piece
    /// of `[offset, offset + len)`, allocating missing lines.
    fn for_each_piece<F>(&self, offset: usize, len: usize, mut f: F)
    where
        F: FnMut(&mut Line, std::ops::Range<usize>, std::ops::Range<usize>),
    {
        self.check(offset, len);
        let mut lines = self.lines.borrow_mut();
        let mut done = 0;
        while done < len {
            let at = offset + done;
            let base = self.line_base(at);
            let in_line = at - base;
            let n = (self.line - in_line).min(len - done);

            let line = match lines.entry(base) {
                Entry::Occupied(e) => {
                    self.bump(|s| s.hits += 1);
                    e.into_mut()
                }
                Entry::Vacant(e) => {
                    self.bump(|s| s.misses += 1);
                    let mut data = vec![0u8; self.line].into_boxed_slice();
                    let avail = self.line.min(self.backing.len() - base);
                    self.backing.load_bytes(base, &mut data[..avail]);
                    e.insert(Line { data, dirty: false })
                }
            };
            f(line, in_line..in_line + n, done..done + n);
            done += n;
        }
    }

    fn line_bases(&self, offset: usize, len: usize) -> impl Iterator<Item = usize> {
        let start = self.line_base(offset);
        let end = offset + len;
        let step = self.line;
        (start..end).step_by(step)
    }

    fn write_back(&self, base: usize, line: &mut Line) {
        let avail = self.line.min(self.backing.len() - base);
        self.backing.store_bytes(base, &line.data[..avail]);
        line.dirty = false;
        self.bump(|s| s.writebacks += 1);
    }
}

impl MemoryPort for SimCachedPort {
    fn len(&self) -> usize {
        self.backing.len()
    }

    fn load_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        self.load_bytes(offset, &mut buf);
        u32::from_ne_bytes(buf)
    }

    fn store_u32(&self, offset: usize, value: u32) {
        self.store_bytes(offset, &value.to_ne_bytes());
    }

    fn load_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.for_each_piece(offset, dst.len(), |line, l, b| {
            dst[b].copy_from_slice(&line.data[l]);
        });
    }

    fn store_bytes(&self, offset: usize, src: &[u8]) {
        self.for_each_piece(offset, src.len(), |line, l, b| {
            line.data[l].copy_from_slice(&src[b]);
            line.dirty = true;
        });
    }

    fn invalidate(&self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.check(offset, len);
        let mut lines = self.lines.borrow_mut();
        for base in self.line_bases(offset, len) {
            if let Some(line) = lines.remove(&base) {
                if line.dirty {
                    log::trace!("invalidate discarded dirty line {:#x}", base);
                    self.bump(|s| s.discarded += 1);
                }
            }
        }
    }

    fn flush(&self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.check(offset, len);
        let mut lines = self.lines.borrow_mut();
        for base in self.line_bases(offset, len) {
            if let Some(line) = lines.get_mut(&base) {
                if line.dirty {
                    self.write_back(base, line);
                }
            }
        }
    }

    fn barrier(&self) {
        fence(Ordering::SeqCst);
    }

    fn cache_model(&self) -> CacheModel {
        CacheModel::WriteBack
    }
}
