//! Heap consistency checking and statistics.

use crate::{
  block::{self, BlockPtr, BlockState, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  error::HeapCheckError,
  first_fit::FirstFitAllocator,
  grower::HeapGrower,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  /// Bytes in allocated blocks, tags included.
  pub allocated: usize,
  /// Bytes in free blocks, tags included.
  pub free: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  pub largest_free: usize,
}

impl<G: HeapGrower> FirstFitAllocator<G> {
  /// Walks the whole heap and reports the first broken invariant.
  pub fn check_heap(&self) -> Result<(), HeapCheckError> {
    let heap = self.grower.heap();
    let heap_size = heap.len();
    let prologue = Tag::pack(DSIZE, BlockState::Allocated);

    if block::get(heap, block::hdrp(self.heap_listp)) != prologue
      || block::get(heap, self.heap_listp.offset()) != prologue
    {
      return Err(HeapCheckError::BadPrologue);
    }

    let mut bp = block::next_blkp(heap, self.heap_listp);
    let mut prev_free: Option<BlockPtr> = None;

    loop {
      if block::hdrp(bp) + WSIZE > heap_size {
        return Err(HeapCheckError::BadEpilogue {
          offset: block::hdrp(bp),
        });
      }

      let header = block::get(heap, block::hdrp(bp));
      let size = header.size();
      if size == 0 {
        break;
      }

      if bp.offset() % DSIZE != 0 {
        return Err(HeapCheckError::MisalignedPayload { ptr: bp });
      }
      if size < MIN_BLOCK_SIZE {
        return Err(HeapCheckError::BadBlockSize { ptr: bp, size });
      }
      if block::hdrp(bp) + size > heap_size - WSIZE {
        return Err(HeapCheckError::BlockOverrun {
          ptr: bp,
          size,
          heap_size,
        });
      }

      let footer = block::get(heap, block::ftrp(heap, bp));
      if footer != header {
        return Err(HeapCheckError::TagMismatch {
          ptr: bp,
          header: header.bits(),
          footer: footer.bits(),
        });
      }

      if header.is_allocated() {
        prev_free = None;
      } else {
        if let Some(first) = prev_free {
          return Err(HeapCheckError::AdjacentFree { first, second: bp });
        }
        prev_free = Some(bp);
      }

      bp = block::next_blkp(heap, bp);
    }

    let epilogue = block::hdrp(bp);
    if epilogue != heap_size - WSIZE
      || block::get(heap, epilogue) != Tag::pack(0, BlockState::Allocated)
    {
      return Err(HeapCheckError::BadEpilogue { offset: epilogue });
    }

    Ok(())
  }

  pub fn stats(&self) -> HeapStats {
    self.blocks().fold(
      HeapStats {
        heap_size: self.heap_size(),
        ..HeapStats::default()
      },
      |mut stats, block| {
        stats.blocks += 1;
        if block.is_free() {
          stats.free += block.size;
          stats.free_blocks += 1;
          stats.largest_free = stats.largest_free.max(block.size);
        } else {
          stats.allocated += block.size;
        }
        stats
      },
    )
  }
}
