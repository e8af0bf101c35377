// Randomized allocate/free/resize sequences checked against the heap invariants

use rand::{Rng, SeedableRng, rngs::StdRng};
use tagalloc::{BlockPtr, FirstFitAllocator, HeapConfig, VecHeap};

struct Live {
  ptr: BlockPtr,
  len: usize,
  fill: u8,
}

fn assert_no_overlap(
  allocator: &FirstFitAllocator,
  live: &[Live],
) {
  let mut spans: Vec<(usize, usize)> = live
    .iter()
    .map(|l| {
      let start = l.ptr.offset() - 4;
      (start, start + allocator.block_size(l.ptr))
    })
    .collect();
  spans.sort();

  for pair in spans.windows(2) {
    assert!(pair[0].1 <= pair[1].0, "blocks overlap: {:?}", pair);
  }
}

fn assert_payloads_intact(
  allocator: &FirstFitAllocator,
  live: &[Live],
) {
  for l in live {
    assert!(
      allocator.payload(l.ptr)[..l.len].iter().all(|&b| b == l.fill),
      "payload at {} was clobbered",
      l.ptr
    );
  }
}

fn run(seed: u64) {
  let _ = env_logger::builder().is_test(true).try_init();
  let mut rng = StdRng::seed_from_u64(seed);
  let mut allocator = FirstFitAllocator::with_config(VecHeap::new(), HeapConfig::new()).unwrap();
  let mut live: Vec<Live> = Vec::new();

  for step in 0..3_000 {
    let roll = rng.gen_range(0..10);

    if roll < 6 || live.is_empty() {
      let len = rng.gen_range(1..=512);
      let fill = rng.r#gen::<u8>();
      let ptr = allocator.allocate(len).unwrap();
      assert_eq!(ptr.offset() % 8, 0);
      assert!(allocator.usable_size(ptr) >= len);
      allocator.payload_mut(ptr)[..len].fill(fill);
      live.push(Live { ptr, len, fill });
    } else if roll < 9 {
      let victim = live.swap_remove(rng.gen_range(0..live.len()));
      allocator.free(victim.ptr);
    } else {
      let index = rng.gen_range(0..live.len());
      let len = rng.gen_range(1..=1024);
      let old = &live[index];
      let kept = old.len.min(len);
      let fill = old.fill;

      let ptr = allocator.resize(Some(old.ptr), len).unwrap().unwrap();
      assert!(
        allocator.payload(ptr)[..kept].iter().all(|&b| b == fill),
        "resize lost data at step {}",
        step
      );

      let fill = rng.r#gen::<u8>();
      allocator.payload_mut(ptr)[..len].fill(fill);
      live[index] = Live { ptr, len, fill };
    }

    if let Err(err) = allocator.check_heap() {
      panic!("seed {} step {}: {}\n{}", seed, step, err, allocator);
    }
    assert_no_overlap(&allocator, &live);
  }

  assert_payloads_intact(&allocator, &live);

  for l in live.drain(..) {
    allocator.free(l.ptr);
  }
  let stats = allocator.stats();
  assert_eq!(stats.allocated, 0);
  assert_eq!(stats.free_blocks, 1);
  assert_eq!(allocator.check_heap(), Ok(()));
}

#[test]
fn random_sequences_keep_the_heap_consistent() {
  for seed in [1, 7, 42, 1234] {
    run(seed);
  }
}

#[test]
fn payloads_survive_unrelated_frees() {
  let mut rng = StdRng::seed_from_u64(99);
  let mut allocator = FirstFitAllocator::init(VecHeap::new()).unwrap();

  let mut live: Vec<Live> = (0..200)
    .map(|i| {
      let len = rng.gen_range(1..=256);
      let ptr = allocator.allocate(len).unwrap();
      allocator.payload_mut(ptr)[..len].fill(i as u8);
      Live {
        ptr,
        len,
        fill: i as u8,
      }
    })
    .collect();

  // Free every other block, then refill the holes.
  let freed: Vec<Live> = (0..live.len() / 2).map(|i| live.remove(i)).collect();
  for l in &freed {
    allocator.free(l.ptr);
  }
  assert_payloads_intact(&allocator, &live);

  for l in &freed {
    let ptr = allocator.allocate(l.len).unwrap();
    allocator.payload_mut(ptr)[..l.len].fill(0xFF);
  }
  assert_payloads_intact(&allocator, &live);
  assert_no_overlap(&allocator, &live);
  assert_eq!(allocator.check_heap(), Ok(()));
}
