use crate::block::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Default number of bytes the heap grows by when no free block fits.
pub const CHUNKSIZE: usize = 1 << 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum growth increment. The allocator rounds it up to the alignment
  /// unit and keeps it between the minimum and maximum block size.
  pub chunk_size: usize,
  /// Run the heap checker after every allocate/free/resize and panic on the
  /// first broken invariant.
  pub check_on_mutation: bool,
}

impl HeapConfig {
  pub fn new() -> Self {
    Self {
      chunk_size: CHUNKSIZE,
      check_on_mutation: false,
    }
  }

  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self.normalized()
  }

  /// The same config with `chunk_size` rounded up to the alignment unit and
  /// kept between the minimum and maximum block size.
  pub(crate) fn normalized(mut self) -> Self {
    let chunk_size = self.chunk_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    self.chunk_size = crate::align!(chunk_size);
    self
  }

  pub fn with_heap_checks(
    mut self,
    enabled: bool,
  ) -> Self {
    self.check_on_mutation = enabled;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
