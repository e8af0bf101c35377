//! # tagalloc - A First-Fit Boundary-Tag Allocator
//!
//! This crate provides an **implicit free list** allocator: every block in
//! the heap carries its size and allocation bit in a header and a footer, and
//! the allocator finds free space by walking the blocks in address order.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────┬──────────┬──────────┬──────────┬───────────┬──────────┐
//!   │ pad │ prologue │ block A  │ block B  │ block C  │  free ... │ epilogue │
//!   │  0  │   8|a    │  24|a    │  48|f    │  24|a    │   n|f     │   0|a    │
//!   └─────┴──────────┴──────────┴──────────┴──────────┴───────────┴──────────┘
//!         ▲                                                                  ▲
//!         │                                                                  │
//!     heap start                                                     heap size
//!
//!   The prologue and epilogue are permanently allocated sentinels, so
//!   walking and merging never need bounds checks.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Boundary tags, block handles and block arithmetic
//!   ├── grower     - HeapGrower trait, VecHeap and MmapHeap
//!   ├── first_fit  - FirstFitAllocator (init, allocate, free, resize)
//!   ├── check      - Heap consistency checker and statistics
//!   ├── config     - HeapConfig
//!   ├── error      - HeapError, HeapCheckError
//!   └── sync       - Locked mutex wrapper
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{FirstFitAllocator, VecHeap};
//!
//! let mut allocator = FirstFitAllocator::init(VecHeap::new()).unwrap();
//!
//! let ptr = allocator.allocate(8).unwrap();
//! allocator.payload_mut(ptr)[..8].copy_from_slice(&42u64.to_ne_bytes());
//!
//! let ptr = allocator.resize(Some(ptr), 64).unwrap().unwrap();
//! assert_eq!(allocator.payload(ptr)[..8], 42u64.to_ne_bytes());
//!
//! allocator.free(ptr);
//! ```
//!
//! ## How It Works
//!
//! - **allocate** rounds the request up to a block size, takes the first
//!   free block that is large enough, and grows the heap by at least one
//!   chunk when none is. Leftover space becomes a new free block if it can
//!   hold at least 16 bytes.
//! - **free** clears the allocation bit and immediately merges the block
//!   with free neighbours, so no two free blocks are ever adjacent.
//! - **resize** allocates a new block, copies the payload and frees the old
//!   block. It never grows in place.
//!
//! Blocks are addressed by [`BlockPtr`], an offset into the heap region, so
//! every access goes through the region's bounds checks.
//!
//! ## Limitations
//!
//! - **Single-threaded**: wrap the allocator in [`Locked`] to share it
//! - **Linear search**: allocation is O(number of blocks)
//! - **Never shrinks**: the heap only grows
//! - **Unchecked frees**: freeing a foreign or already freed offset corrupts
//!   the heap; [`FirstFitAllocator::check_heap`] finds the damage

pub mod align;
pub mod block;
mod check;
mod config;
mod error;
mod first_fit;
mod grower;
mod sync;

pub use block::{Block, BlockPtr, BlockState, Blocks};
pub use check::HeapStats;
pub use config::{CHUNKSIZE, HeapConfig};
pub use error::{HeapCheckError, HeapError};
pub use first_fit::{FirstFitAllocator, print_alloc};
pub use grower::{HeapGrower, MAX_HEAP, MmapHeap, VecHeap};
pub use sync::Locked;
