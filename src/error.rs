//! Errors reported by the allocator and by the heap checker.

use std::fmt;

use crate::block::BlockPtr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
  /// A zero-byte allocation was requested.
  InvalidRequest,

  /// No block of `requested` bytes (the request plus tag overhead, rounded
  /// up) fits: the grower refused to grow, or the block is larger than a
  /// tag can describe.
  HeapExhausted { requested: usize },

  /// The grower could not supply the initial region or the first chunk.
  InitializationFailure { requested: usize },

  /// Reserving address space for an [`MmapHeap`](crate::MmapHeap) failed.
  MapFailed { size: usize, errno: i32 },
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::InvalidRequest => write!(f, "Invalid request: cannot allocate 0 bytes"),
      HeapError::HeapExhausted { requested } => {
        write!(f, "Heap exhausted: no room for a {} byte block", requested)
      }
      HeapError::InitializationFailure { requested } => {
        write!(f, "Heap initialization failed: could not obtain {} bytes", requested)
      }
      HeapError::MapFailed { size, errno } => {
        write!(f, "Could not reserve {} bytes of address space (errno {})", size, errno)
      }
    }
  }
}

impl std::error::Error for HeapError {}

/// A broken heap invariant found by
/// [`FirstFitAllocator::check_heap`](crate::FirstFitAllocator::check_heap).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapCheckError {
  BadPrologue,
  BadEpilogue { offset: usize },
  MisalignedPayload { ptr: BlockPtr },
  BadBlockSize { ptr: BlockPtr, size: usize },
  BlockOverrun { ptr: BlockPtr, size: usize, heap_size: usize },
  TagMismatch { ptr: BlockPtr, header: u32, footer: u32 },
  AdjacentFree { first: BlockPtr, second: BlockPtr },
}

impl fmt::Display for HeapCheckError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapCheckError::BadPrologue => write!(f, "Prologue header/footer corrupted"),
      HeapCheckError::BadEpilogue { offset } => {
        write!(f, "Missing epilogue: block walk ended at offset {:#x}", offset)
      }
      HeapCheckError::MisalignedPayload { ptr } => {
        write!(f, "Payload at {} is not double-word aligned", ptr)
      }
      HeapCheckError::BadBlockSize { ptr, size } => {
        write!(f, "Block at {} has invalid size {}", ptr, size)
      }
      HeapCheckError::BlockOverrun { ptr, size, heap_size } => write!(
        f,
        "Block at {} of size {} runs past the end of a {} byte heap",
        ptr, size, heap_size
      ),
      HeapCheckError::TagMismatch { ptr, header, footer } => write!(
        f,
        "Block at {} has header {:#x} but footer {:#x}",
        ptr, header, footer
      ),
      HeapCheckError::AdjacentFree { first, second } => {
        write!(f, "Free blocks at {} and {} were not coalesced", first, second)
      }
    }
  }
}

impl std::error::Error for HeapCheckError {}
