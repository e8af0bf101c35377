//! Sources of heap memory.
//!
//! The allocator never touches the process break directly; it asks a
//! [`HeapGrower`] to append bytes to the end of one contiguous region and
//! addresses everything by offset into that region.

use std::{io, ptr::NonNull, slice};

use libc::{
  MAP_ANONYMOUS, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap, munmap,
};
use log::warn;

use crate::error::HeapError;

/// Default upper bound on a heap region, 20 MiB.
pub const MAX_HEAP: usize = 20 * (1 << 20);

pub trait HeapGrower {
  /// Appends `incr` bytes to the region and returns the offset of the first
  /// new byte (the old break), or `None` if the region cannot grow that far.
  /// Previously returned bytes never move.
  fn grow_heap(
    &mut self,
    incr: usize,
  ) -> Option<usize>;

  /// Everything between the start of the region and the current break.
  fn heap(&self) -> &[u8];

  fn heap_mut(&mut self) -> &mut [u8];

  fn heap_size(&self) -> usize {
    self.heap().len()
  }
}

/// A zero-filled heap region backed by a `Vec<u8>`.
#[derive(Debug, Clone)]
pub struct VecHeap {
  buf: Vec<u8>,
  max_heap: usize,
}

impl VecHeap {
  pub fn new() -> Self {
    Self::with_max_heap(MAX_HEAP)
  }

  pub fn with_max_heap(max_heap: usize) -> Self {
    Self {
      buf: Vec::new(),
      max_heap,
    }
  }

  pub fn max_heap(&self) -> usize {
    self.max_heap
  }
}

impl Default for VecHeap {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapGrower for VecHeap {
  fn grow_heap(
    &mut self,
    incr: usize,
  ) -> Option<usize> {
    let old_brk = self.buf.len();
    if incr > self.max_heap - old_brk {
      warn!(
        "VecHeap refused to grow by {} bytes ({} of {} in use)",
        incr, old_brk, self.max_heap
      );
      return None;
    }
    self.buf.resize(old_brk + incr, 0);
    Some(old_brk)
  }

  fn heap(&self) -> &[u8] {
    &self.buf
  }

  fn heap_mut(&mut self) -> &mut [u8] {
    &mut self.buf
  }
}

/// A heap region carved out of a private anonymous mapping.
///
/// The whole `max_heap` range is reserved up front with `MAP_NORESERVE`, so
/// pages are only backed once the break moves over them and the region never
/// relocates. The break is private to this instance, unlike `sbrk(2)` which
/// is shared with the system allocator.
pub struct MmapHeap {
  base: NonNull<u8>,
  mapped: usize,
  brk: usize,
}

// SAFETY: the mapping is owned exclusively by this value and only reached
// through `&self`/`&mut self`.
unsafe impl Send for MmapHeap {}

impl MmapHeap {
  pub fn new() -> Result<Self, HeapError> {
    Self::reserve(MAX_HEAP)
  }

  /// Reserves `max_heap` bytes (rounded up to whole pages) of address space.
  pub fn reserve(max_heap: usize) -> Result<Self, HeapError> {
    let page = page_size();
    let mapped = max_heap
      .checked_add(page - 1)
      .map(|size| size / page * page)
      .filter(|&size| size > 0)
      .ok_or(HeapError::MapFailed {
        size: max_heap,
        errno: libc::EINVAL,
      })?;

    // SAFETY: a fresh anonymous mapping aliases nothing.
    let ptr = unsafe {
      mmap(
        std::ptr::null_mut(),
        mapped,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
        -1,
        0,
      )
    };
    if ptr == MAP_FAILED {
      return Err(HeapError::MapFailed {
        size: mapped,
        errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
      });
    }

    let base = NonNull::new(ptr as *mut u8).ok_or(HeapError::MapFailed {
      size: mapped,
      errno: 0,
    })?;
    Ok(Self { base, mapped, brk: 0 })
  }

  pub fn max_heap(&self) -> usize {
    self.mapped
  }

  /// Address of the start of the region, for printing.
  pub fn base(&self) -> *const u8 {
    self.base.as_ptr()
  }
}

impl HeapGrower for MmapHeap {
  fn grow_heap(
    &mut self,
    incr: usize,
  ) -> Option<usize> {
    let old_brk = self.brk;
    if incr > self.mapped - old_brk {
      warn!(
        "MmapHeap refused to grow by {} bytes ({} of {} in use)",
        incr, old_brk, self.mapped
      );
      return None;
    }
    self.brk += incr;
    Some(old_brk)
  }

  fn heap(&self) -> &[u8] {
    // SAFETY: `brk <= mapped` and the mapping lives as long as `self`.
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
  }

  fn heap_mut(&mut self) -> &mut [u8] {
    // SAFETY: as above, and `&mut self` makes the slice unique.
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
  }
}

impl Drop for MmapHeap {
  fn drop(&mut self) {
    // SAFETY: `base..base + mapped` is exactly the range mapped in `reserve`.
    unsafe {
      munmap(self.base.as_ptr() as _, self.mapped);
    }
  }
}

fn page_size() -> usize {
  // SAFETY: sysconf has no memory-safety preconditions.
  let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
  if page > 0 { page as usize } else { 4096 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vec_heap_grows_contiguously() {
    let mut heap = VecHeap::with_max_heap(64);

    assert_eq!(heap.grow_heap(16), Some(0));
    assert_eq!(heap.grow_heap(32), Some(16));
    assert_eq!(heap.heap_size(), 48);
    assert!(heap.heap().iter().all(|&b| b == 0));
  }

  #[test]
  fn vec_heap_refuses_past_its_limit() {
    let mut heap = VecHeap::with_max_heap(64);

    assert_eq!(heap.grow_heap(48), Some(0));
    assert_eq!(heap.grow_heap(17), None);
    assert_eq!(heap.heap_size(), 48);
    assert_eq!(heap.grow_heap(16), Some(48));
  }

  #[test]
  fn mmap_heap_grows_within_its_reservation() {
    let mut heap = MmapHeap::reserve(8192).unwrap();

    assert!(heap.max_heap() >= 8192);
    assert_eq!(heap.grow_heap(4096), Some(0));
    heap.heap_mut()[4095] = 0xAB;
    assert_eq!(heap.grow_heap(100), Some(4096));
    assert_eq!(heap.heap()[4095], 0xAB);
    assert_eq!(heap.heap()[4096], 0);
    assert_eq!(heap.grow_heap(heap.max_heap()), None);
  }

  #[test]
  fn mmap_heap_rejects_empty_reservation() {
    assert!(matches!(
      MmapHeap::reserve(0),
      Err(HeapError::MapFailed { size: 0, .. })
    ));
  }
}
