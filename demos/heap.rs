use std::io::Read;

use tagalloc::{FirstFitAllocator, HeapGrower, MmapHeap, print_alloc};

/// Waits until the user presses ENTER when the demo runs with `--step`.
fn block_until_enter_pressed(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current heap bound next to the real address of the region.
fn print_heap_break(
  label: &str,
  allocator: &FirstFitAllocator<MmapHeap>,
) {
  println!(
    "[{}] PID = {}, region = {:?}, heap size = {}",
    label,
    std::process::id(),
    allocator.grower().base(),
    allocator.grower().heap_size(),
  );
}

fn main() {
  env_logger::init();
  let step = std::env::args().any(|arg| arg == "--step");

  let heap = match MmapHeap::new() {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("{}", err);
      std::process::exit(1);
    }
  };
  let mut allocator = match FirstFitAllocator::init(heap) {
    Ok(allocator) => allocator,
    Err(err) => {
      eprintln!("{}", err);
      std::process::exit(1);
    }
  };

  print_heap_break("start", &allocator);
  println!("{}", allocator);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 1) Two small allocations land back to back in the first chunk.
  // --------------------------------------------------------------------
  println!("\n[1] Allocate 16 bytes twice");
  let first = allocator.allocate(16).expect("first chunk has room");
  print_alloc(&allocator, 16, first);
  let second = allocator.allocate(16).expect("first chunk has room");
  print_alloc(&allocator, 16, second);

  allocator.payload_mut(first)[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  println!("[1] second - first = {} bytes", second.offset() - first.offset());
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 2) Free the first block and ask for the same size again: it is reused.
  // --------------------------------------------------------------------
  allocator.free(first);
  let reused = allocator.allocate(16).expect("freed block fits");
  println!("\n[2] Free first, allocate 16 again");
  print_alloc(&allocator, 16, reused);
  println!("[2] reused == first? {}", reused == first);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 3) Free both: the neighbours merge and a 40 byte request fits in
  //    their place without growing the heap.
  // --------------------------------------------------------------------
  let before = allocator.heap_size();
  allocator.free(reused);
  allocator.free(second);
  let merged = allocator.allocate(40).expect("coalesced space fits");
  println!("\n[3] Free both, allocate 40");
  print_alloc(&allocator, 40, merged);
  println!("[3] heap grew? {}", allocator.heap_size() != before);
  println!("{}", allocator);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 4) Resize copies the payload into a bigger block.
  // --------------------------------------------------------------------
  allocator.payload_mut(merged)[..5].copy_from_slice(b"hello");
  let resized = allocator
    .resize(Some(merged), 200)
    .expect("heap can grow")
    .expect("non-zero size keeps a block");
  println!("\n[4] Resize 40 -> 200");
  print_alloc(&allocator, 200, resized);
  println!(
    "[4] payload starts with {:?}",
    String::from_utf8_lossy(&allocator.payload(resized)[..5])
  );
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 5) A large request grows the heap past the first chunk.
  // --------------------------------------------------------------------
  print_heap_break("before large alloc", &allocator);
  let big = allocator.allocate(64 * 1024).expect("region has room");
  println!("\n[5] Allocate 64 KiB");
  print_alloc(&allocator, 64 * 1024, big);
  print_heap_break("after large alloc", &allocator);
  block_until_enter_pressed(step);

  allocator.free(big);
  allocator.free(resized);

  let stats = allocator.stats();
  println!("\n[6] Everything freed: {:?}", stats);
  match allocator.check_heap() {
    Ok(()) => println!("[6] heap is consistent"),
    Err(err) => println!("[6] heap check failed: {}", err),
  }
}
