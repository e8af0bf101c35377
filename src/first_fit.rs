use std::fmt;

use log::{debug, trace};

use crate::{
  align,
  block::{self, BlockPtr, BlockState, Blocks, DSIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  config::HeapConfig,
  error::HeapError,
  grower::{HeapGrower, VecHeap},
};

pub fn print_alloc<G: HeapGrower>(
  allocator: &FirstFitAllocator<G>,
  size: usize,
  bp: BlockPtr,
) {
  println!(
    "Allocated {} bytes, offset = {}, block size = {}, heap size = {}",
    size,
    bp,
    allocator.block_size(bp),
    allocator.heap_size()
  );
}

/// A first-fit allocator over an implicit list of boundary-tagged blocks.
pub struct FirstFitAllocator<G: HeapGrower = VecHeap> {
  pub(crate) grower: G,
  /// Payload offset of the prologue block.
  pub(crate) heap_listp: BlockPtr,
  config: HeapConfig,
}

impl<G: HeapGrower> FirstFitAllocator<G> {
  /// Lays out the prologue and epilogue and grows the heap by one chunk.
  pub fn init(grower: G) -> Result<Self, HeapError> {
    Self::with_config(grower, HeapConfig::default())
  }

  pub fn with_config(
    mut grower: G,
    config: HeapConfig,
  ) -> Result<Self, HeapError> {
    let config = config.normalized();
    let start = grower
      .grow_heap(4 * WSIZE)
      .ok_or(HeapError::InitializationFailure { requested: 4 * WSIZE })?;
    debug_assert!(start % DSIZE == 0);

    let heap = grower.heap_mut();
    block::put(heap, start, Tag::EMPTY);
    block::write_block(
      heap,
      BlockPtr::new(start + 2 * WSIZE),
      DSIZE,
      BlockState::Allocated,
    );
    block::put(heap, start + 3 * WSIZE, Tag::pack(0, BlockState::Allocated));

    let mut allocator = Self {
      grower,
      heap_listp: BlockPtr::new(start + 2 * WSIZE),
      config,
    };

    allocator
      .extend_heap(config.chunk_size)
      .map_err(|_| HeapError::InitializationFailure {
        requested: config.chunk_size,
      })?;

    debug!(
      "heap initialized: {} bytes, chunk size {}",
      allocator.heap_size(),
      config.chunk_size
    );
    Ok(allocator)
  }

  /// Grows the heap by `size` bytes (rounded up) as one free block and
  /// returns it after merging with a free block that ended the old heap.
  fn extend_heap(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, HeapError> {
    let size = align!(size);

    // The whole heap must stay describable by a single tag.
    match self.grower.heap_size().checked_add(size) {
      Some(end) if end <= MAX_BLOCK_SIZE => {}
      _ => return Err(HeapError::HeapExhausted { requested: size }),
    }

    let bp = self
      .grower
      .grow_heap(size)
      .map(BlockPtr::new)
      .ok_or(HeapError::HeapExhausted { requested: size })?;

    // The new block's header lands on the old epilogue.
    let heap = self.grower.heap_mut();
    block::write_block(heap, bp, size, BlockState::Free);
    block::put(
      heap,
      bp.offset() + size - WSIZE,
      Tag::pack(0, BlockState::Allocated),
    );

    trace!("heap grew by {} bytes to {}", size, self.heap_size());
    Ok(self.coalesce(bp))
  }

  fn find_fit(
    &self,
    asize: usize,
  ) -> Option<BlockPtr> {
    self
      .blocks()
      .find(|block| block.is_free() && block.size >= asize)
      .map(|block| block.ptr)
  }

  /// Marks `asize` bytes of the free block at `bp` allocated, splitting off
  /// the rest as a new free block when it can stand on its own.
  fn place(
    &mut self,
    bp: BlockPtr,
    asize: usize,
  ) {
    let heap = self.grower.heap_mut();
    let csize = block::get(heap, block::hdrp(bp)).size();

    if csize - asize >= MIN_BLOCK_SIZE {
      block::write_block(heap, bp, asize, BlockState::Allocated);
      let rest = BlockPtr::new(bp.offset() + asize);
      block::write_block(heap, rest, csize - asize, BlockState::Free);
      trace!("split {} byte block at {}: {} + {}", csize, bp, asize, csize - asize);
    } else {
      block::write_block(heap, bp, csize, BlockState::Allocated);
    }
  }

  /// Merges the free block at `bp` with free neighbours and returns the
  /// payload offset of the merged block.
  fn coalesce(
    &mut self,
    bp: BlockPtr,
  ) -> BlockPtr {
    let heap = self.grower.heap_mut();
    let prev = block::prev_blkp(heap, bp);
    let next = block::next_blkp(heap, bp);
    let prev_alloc = block::get(heap, bp.offset() - DSIZE).is_allocated();
    let next_tag = block::get(heap, block::hdrp(next));
    let mut size = block::get(heap, block::hdrp(bp)).size();

    match (prev_alloc, next_tag.is_allocated()) {
      (true, true) => bp,
      (true, false) => {
        size += next_tag.size();
        block::write_block(heap, bp, size, BlockState::Free);
        trace!("coalesced {} with next block {} ({} bytes)", bp, next, size);
        bp
      }
      (false, true) => {
        size += block::get(heap, block::hdrp(prev)).size();
        block::write_block(heap, prev, size, BlockState::Free);
        trace!("coalesced {} into previous block {} ({} bytes)", bp, prev, size);
        prev
      }
      (false, false) => {
        size += block::get(heap, block::hdrp(prev)).size() + next_tag.size();
        block::write_block(heap, prev, size, BlockState::Free);
        trace!("coalesced {} with both neighbours into {} ({} bytes)", bp, prev, size);
        prev
      }
    }
  }

  fn after_mutation(
    &self,
    op: &str,
  ) {
    if self.config.check_on_mutation {
      if let Err(err) = self.check_heap() {
        panic!("Found issues in `{}`: {}", op, err);
      }
    }
  }
}

/// Block size for a `size`-byte request: overhead added, rounded to the
/// alignment unit, never below the minimum block. Saturates instead of
/// overflowing, so oversized requests come out above [`MAX_BLOCK_SIZE`].
fn adjusted_size(size: usize) -> usize {
  if size <= DSIZE {
    MIN_BLOCK_SIZE
  } else {
    size.saturating_add(DSIZE + (DSIZE - 1)) / DSIZE * DSIZE
  }
}

// public interface
impl<G: HeapGrower> FirstFitAllocator<G> {
  /// Returns the payload offset of a block with at least `size` usable bytes.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, HeapError> {
    if size == 0 {
      return Err(HeapError::InvalidRequest);
    }
    let asize = adjusted_size(size);
    let exhausted = HeapError::HeapExhausted { requested: asize };
    if asize > MAX_BLOCK_SIZE {
      debug!("allocate({}) failed: {}", size, exhausted);
      return Err(exhausted);
    }

    let bp = match self.find_fit(asize) {
      Some(bp) => bp,
      None => {
        let extend_size = asize.max(self.config.chunk_size);
        self.extend_heap(extend_size).map_err(|_| {
          debug!("allocate({}) failed: {}", size, exhausted);
          exhausted
        })?
      }
    };
    self.place(bp, asize);

    debug!("allocate({}) -> {} ({} byte block)", size, bp, self.block_size(bp));
    self.after_mutation("allocate");
    Ok(bp)
  }

  /// Releases the block at `bp`. `bp` must come from `allocate` or `resize`
  /// and not have been freed since; anything else corrupts the heap.
  pub fn free(
    &mut self,
    bp: BlockPtr,
  ) {
    let heap = self.grower.heap_mut();
    let size = block::get(heap, block::hdrp(bp)).size();
    block::write_block(heap, bp, size, BlockState::Free);
    let merged = self.coalesce(bp);

    debug!("free({}) -> free block at {}", bp, merged);
    self.after_mutation("free");
  }

  /// Moves the allocation at `ptr` to a new block of `size` bytes.
  ///
  /// `None` behaves like [`allocate`](Self::allocate) and a zero `size` like
  /// [`free`](Self::free), returning `Ok(None)`. Otherwise the first
  /// `min(size, usable_size(ptr))` bytes are copied into a fresh block and
  /// the old one is freed. On failure the old block is left allocated.
  pub fn resize(
    &mut self,
    ptr: Option<BlockPtr>,
    size: usize,
  ) -> Result<Option<BlockPtr>, HeapError> {
    let Some(old) = ptr else {
      return self.allocate(size).map(Some);
    };
    if size == 0 {
      self.free(old);
      return Ok(None);
    }

    let new = self.allocate(size)?;
    let copy = size.min(self.usable_size(old));
    let src = old.offset();
    self
      .grower
      .heap_mut()
      .copy_within(src..src + copy, new.offset());
    self.free(old);

    debug!("resize({}, {}) -> {}, copied {} bytes", old, size, new, copy);
    Ok(Some(new))
  }

  /// Total size of the block at `bp`, header and footer included.
  pub fn block_size(
    &self,
    bp: BlockPtr,
  ) -> usize {
    block::get(self.grower.heap(), block::hdrp(bp)).size()
  }

  pub fn usable_size(
    &self,
    bp: BlockPtr,
  ) -> usize {
    self.block_size(bp) - DSIZE
  }

  pub fn payload(
    &self,
    bp: BlockPtr,
  ) -> &[u8] {
    let len = self.usable_size(bp);
    &self.grower.heap()[bp.offset()..bp.offset() + len]
  }

  pub fn payload_mut(
    &mut self,
    bp: BlockPtr,
  ) -> &mut [u8] {
    let len = self.usable_size(bp);
    &mut self.grower.heap_mut()[bp.offset()..bp.offset() + len]
  }

  /// Current upper bound of the heap.
  pub fn heap_size(&self) -> usize {
    self.grower.heap_size()
  }

  /// Every block between the prologue and the epilogue, in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    let heap = self.grower.heap();
    Blocks::new(heap, block::next_blkp(heap, self.heap_listp))
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }
}

impl<G: HeapGrower> fmt::Debug for FirstFitAllocator<G> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("FirstFitAllocator")
      .field("heap_size", &self.heap_size())
      .field("heap_listp", &self.heap_listp)
      .field("config", &self.config)
      .finish()
  }
}

impl<G: HeapGrower> fmt::Display for FirstFitAllocator<G> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "heap: {} bytes", self.heap_size())?;
    writeln!(f, "  {:>8}  {:>8}  prologue", self.heap_listp, DSIZE)?;
    for block in self.blocks() {
      let state = if block.is_free() { "free" } else { "allocated" };
      writeln!(f, "  {:>8}  {:>8}  {}", block.ptr, block.size, state)?;
    }
    write!(f, "  {:>8}  {:>8}  epilogue", BlockPtr::new(self.heap_size()), 0)
  }
}
