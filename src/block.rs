//! Boundary tags and block arithmetic.
//!
//! Every block starts with a 4-byte header tag and ends with a 4-byte footer
//! tag. The payload offset handed out to callers ([`BlockPtr`]) points just
//! past the header:
//!
//! ```text
//!   ┌────────┬──────────────────────────────┬────────┐
//!   │ header │           payload            │ footer │
//!   │ size|a │                              │ size|a │
//!   └────────┴──────────────────────────────┴────────┘
//!            ▲
//!            └── BlockPtr
//! ```

use std::fmt;

/// Width of a header or footer tag.
pub const WSIZE: usize = 4;
/// Alignment unit: every block size and payload offset is a multiple of this.
pub const DSIZE: usize = 8;
/// Smallest block that can hold a header, a footer and a payload word.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;
/// Largest size a tag can encode.
pub const MAX_BLOCK_SIZE: usize = (u32::MAX & !0x7) as usize;

const ALLOC_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
  Free,
  Allocated,
}

/// A packed `(size, allocated)` header or footer word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(u32);

impl Tag {
  /// The padding word in front of the prologue.
  pub const EMPTY: Tag = Tag(0);

  /// Packs a block size and state. `size` must be a multiple of [`DSIZE`]
  /// no larger than [`MAX_BLOCK_SIZE`].
  pub const fn pack(
    size: usize,
    state: BlockState,
  ) -> Self {
    debug_assert!(size % DSIZE == 0 && size <= MAX_BLOCK_SIZE);
    let alloc = match state {
      BlockState::Free => 0,
      BlockState::Allocated => ALLOC_BIT,
    };
    Tag(size as u32 | alloc)
  }

  pub const fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOC_BIT != 0
  }

  pub const fn state(self) -> BlockState {
    if self.is_allocated() {
      BlockState::Allocated
    } else {
      BlockState::Free
    }
  }

  pub const fn bits(self) -> u32 {
    self.0
  }
}

/// Offset of a block's payload from the start of the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(usize);

impl BlockPtr {
  pub(crate) const fn new(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }
}

impl fmt::Display for BlockPtr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.pad(&format!("{:#x}", self.0))
  }
}

/// A decoded view of one block in the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  pub ptr: BlockPtr,
  pub size: usize,
  pub state: BlockState,
}

impl Block {
  pub fn is_free(&self) -> bool {
    self.state == BlockState::Free
  }

  /// Bytes a caller may use: the block minus its header and footer.
  pub fn payload_size(&self) -> usize {
    self.size.saturating_sub(DSIZE)
  }
}

pub(crate) fn get(
  heap: &[u8],
  at: usize,
) -> Tag {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&heap[at..at + WSIZE]);
  Tag(u32::from_ne_bytes(word))
}

pub(crate) fn put(
  heap: &mut [u8],
  at: usize,
  tag: Tag,
) {
  heap[at..at + WSIZE].copy_from_slice(&tag.0.to_ne_bytes());
}

pub(crate) const fn hdrp(bp: BlockPtr) -> usize {
  bp.0 - WSIZE
}

pub(crate) fn ftrp(
  heap: &[u8],
  bp: BlockPtr,
) -> usize {
  bp.0 + get(heap, hdrp(bp)).size() - DSIZE
}

pub(crate) fn next_blkp(
  heap: &[u8],
  bp: BlockPtr,
) -> BlockPtr {
  BlockPtr(bp.0 + get(heap, hdrp(bp)).size())
}

/// Only valid when the word before the header is a footer, which holds for
/// every block after the prologue.
pub(crate) fn prev_blkp(
  heap: &[u8],
  bp: BlockPtr,
) -> BlockPtr {
  BlockPtr(bp.0 - get(heap, bp.0 - DSIZE).size())
}

/// Writes matching header and footer tags for a block of `size` bytes.
pub(crate) fn write_block(
  heap: &mut [u8],
  bp: BlockPtr,
  size: usize,
  state: BlockState,
) {
  let tag = Tag::pack(size, state);
  put(heap, hdrp(bp), tag);
  put(heap, bp.0 + size - DSIZE, tag);
}

pub(crate) fn read_block(
  heap: &[u8],
  bp: BlockPtr,
) -> Block {
  let tag = get(heap, hdrp(bp));
  Block {
    ptr: bp,
    size: tag.size(),
    state: tag.state(),
  }
}

/// Walks the implicit block list forward until the epilogue.
pub struct Blocks<'a> {
  heap: &'a [u8],
  bp: BlockPtr,
}

impl<'a> Blocks<'a> {
  pub(crate) fn new(
    heap: &'a [u8],
    first: BlockPtr,
  ) -> Self {
    Self { heap, bp: first }
  }
}

impl Iterator for Blocks<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if hdrp(self.bp) + WSIZE > self.heap.len() {
      return None;
    }
    let block = read_block(self.heap, self.bp);
    if block.size == 0 {
      return None;
    }
    self.bp = BlockPtr(self.bp.0 + block.size);
    Some(block)
  }
}
