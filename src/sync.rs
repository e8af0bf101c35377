use std::sync::{Mutex, MutexGuard, PoisonError};

/// Puts an allocator behind a mutex so it can be shared between threads.
/// The allocator itself does no locking.
#[derive(Debug, Default)]
pub struct Locked<A> {
  inner: Mutex<A>,
}

impl<A> Locked<A> {
  pub const fn new(inner: A) -> Self {
    Self {
      inner: Mutex::new(inner),
    }
  }

  /// A panic while the lock was held leaves the heap as it was at the
  /// panic; the guard is handed out anyway and `check_heap` can vet it.
  pub fn lock(&self) -> MutexGuard<'_, A> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn into_inner(self) -> A {
    self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;
  use crate::{FirstFitAllocator, MmapHeap};

  #[test]
  fn shared_allocator_survives_concurrent_use() {
    let heap = MmapHeap::reserve(1 << 20).unwrap();
    let allocator = Arc::new(Locked::new(FirstFitAllocator::init(heap).unwrap()));

    let workers: Vec<_> = (0..4u8)
      .map(|id| {
        let allocator = Arc::clone(&allocator);
        thread::spawn(move || {
          for round in 0..200usize {
            let size = 1 + (round * 7 + id as usize) % 96;
            let mut heap = allocator.lock();
            let bp = heap.allocate(size).unwrap();
            heap.payload_mut(bp)[..size].fill(id);
            assert!(heap.payload(bp)[..size].iter().all(|&b| b == id));
            heap.free(bp);
          }
        })
      })
      .collect();

    for worker in workers {
      worker.join().unwrap();
    }

    let allocator = Arc::try_unwrap(allocator).unwrap().into_inner();
    assert_eq!(allocator.check_heap(), Ok(()));
    assert_eq!(allocator.stats().free_blocks, 1);
  }
}
