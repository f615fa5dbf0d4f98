use std::ptr::NonNull;

use brkalloc::{ArenaAllocator, ArenaConfig, BlockInfo, HEADER_SIZE, MemorySource, ReservedHeap, Status};

const THRESHOLD: usize = ArenaConfig::DEFAULT_MMAP_THRESHOLD;

fn arena() -> ArenaAllocator<ReservedHeap> {
  ArenaAllocator::new(ReservedHeap::new().unwrap())
}

fn fill(
  ptr: NonNull<u8>,
  len: usize,
  byte: u8,
) {
  unsafe { ptr.as_ptr().write_bytes(byte, len) };
}

fn holds(
  ptr: NonNull<u8>,
  len: usize,
  byte: u8,
) -> bool {
  unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) }
    .iter()
    .all(|&b| b == byte)
}

fn block_at(
  arena: &ArenaAllocator<ReservedHeap>,
  ptr: NonNull<u8>,
) -> BlockInfo {
  arena
    .blocks()
    .find(|block| block.payload == ptr.as_ptr() as usize)
    .expect("pointer is not a heap block")
}

#[test]
fn test_first_allocation_preallocates_whole_threshold() {
  let mut arena = arena();

  let ptr = arena.allocate(100).unwrap();

  let blocks: Vec<_> = arena.blocks().collect();
  assert_eq!(blocks.len(), 1);
  assert_eq!(blocks[0].payload, ptr.as_ptr() as usize);
  assert_eq!(blocks[0].size, THRESHOLD - HEADER_SIZE);
  assert_eq!(blocks[0].status, Status::Allocated);
  assert_eq!(arena.stats().heap_bytes, THRESHOLD);
  assert_eq!(ptr.as_ptr() as usize, arena.source().base().as_ptr() as usize + HEADER_SIZE);
}

#[test]
fn test_returned_pointers_are_aligned() {
  let mut arena = arena();

  for size in [1, 3, 7, 13, 100, 999, 4097, 200_000] {
    let ptr = arena.allocate(size).unwrap();
    assert_eq!(ptr.as_ptr() as usize % brkalloc::ALIGNMENT, 0, "size {size}");
  }
}

#[test]
fn test_release_then_allocate_reuses_the_address() {
  let mut arena = arena();

  let first = arena.allocate(40).unwrap();
  unsafe { arena.release(Some(first)) };
  let second = arena.allocate(40).unwrap();

  assert_eq!(first, second);
  assert_eq!(arena.stats().heap_bytes, THRESHOLD);
}

#[test]
fn test_reused_preallocation_is_split() {
  let mut arena = arena();
  let first = arena.allocate(100).unwrap();
  unsafe { arena.release(Some(first)) };

  let again = arena.allocate(1000).unwrap();

  let blocks: Vec<_> = arena.blocks().collect();
  assert_eq!(again, first);
  assert_eq!(blocks.len(), 2);
  assert_eq!(blocks[0].size, 1000);
  assert_eq!(blocks[1].status, Status::Free);
  assert_eq!(blocks[1].size, THRESHOLD - HEADER_SIZE - 1000 - HEADER_SIZE);
}

#[test]
fn test_best_fit_picks_the_smallest_free_block() {
  let mut arena = arena();
  arena.allocate(8).unwrap();
  let large = arena.allocate(256).unwrap();
  arena.allocate(8).unwrap();
  let small = arena.allocate(64).unwrap();
  arena.allocate(8).unwrap();

  unsafe {
    arena.release(Some(large));
    arena.release(Some(small));
  }

  assert_eq!(arena.allocate(48).unwrap(), small);
  assert_eq!(arena.allocate(200).unwrap(), large);
}

#[test]
fn test_adjacent_releases_coalesce() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let a = arena.allocate(200).unwrap();
  let b = arena.allocate(300).unwrap();
  arena.allocate(16).unwrap();

  unsafe {
    arena.release(Some(a));
    arena.release(Some(b));
  }

  let merged = block_at(&arena, a);
  assert_eq!(merged.status, Status::Free);
  assert_eq!(merged.size, 200 + 304 + HEADER_SIZE);
  assert_eq!(arena.blocks().count(), 3);
  assert!(arena.validate().is_ok());
}

#[test]
fn test_release_merges_with_both_neighbours() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let a = arena.allocate(64).unwrap();
  let b = arena.allocate(64).unwrap();
  let c = arena.allocate(64).unwrap();
  arena.allocate(16).unwrap();

  unsafe {
    arena.release(Some(a));
    arena.release(Some(c));
    arena.release(Some(b));
  }

  let merged = block_at(&arena, a);
  assert_eq!(merged.size, 3 * 64 + 2 * HEADER_SIZE);
  assert_eq!(arena.blocks().count(), 3);
}

#[test]
fn test_free_tail_grows_in_place() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let tail = arena.allocate(64).unwrap();
  unsafe { arena.release(Some(tail)) };
  let before = arena.stats().heap_bytes;

  let grown = arena.allocate(128).unwrap();

  assert_eq!(grown, tail);
  assert_eq!(block_at(&arena, grown).size, 128);
  assert_eq!(arena.stats().heap_bytes, before + 64);
}

#[test]
fn test_free_tail_wins_over_a_fitting_block() {
  let mut arena = arena();
  arena.allocate(8).unwrap();
  let middle = arena.allocate(64).unwrap();
  arena.allocate(8).unwrap();
  let tail = arena.allocate(16).unwrap();
  unsafe {
    arena.release(Some(middle));
    arena.release(Some(tail));
  }
  let before = arena.stats().heap_bytes;

  let ptr = arena.allocate(32).unwrap();

  assert_eq!(ptr, tail);
  assert_eq!(block_at(&arena, ptr).size, 32);
  assert_eq!(block_at(&arena, middle).status, Status::Free);
  assert_eq!(arena.stats().heap_bytes, before + 16);
  assert!(arena.validate().is_ok());
}

#[test]
fn test_large_allocation_is_an_independent_mapping() {
  let mut arena = arena();

  let ptr = arena.allocate(200_000).unwrap();

  assert_eq!(arena.blocks().count(), 0);
  assert_eq!(arena.stats().mapped_regions, 1);
  assert_eq!(arena.stats().mapped_bytes, 200_000 + HEADER_SIZE);
  assert_eq!(unsafe { arena.usable_size(ptr) }, 200_000);
  fill(ptr, 200_000, 0x11);

  unsafe { arena.release(Some(ptr)) };

  assert_eq!(arena.stats().mapped_regions, 0);
  assert_eq!(arena.stats().mapped_bytes, 0);
}

#[test]
fn test_threshold_boundary_counts_the_header() {
  let mut arena = arena();

  arena.allocate(THRESHOLD - HEADER_SIZE - 8).unwrap();
  assert_eq!(arena.stats().mapped_regions, 0);

  arena.allocate(THRESHOLD - HEADER_SIZE).unwrap();
  assert_eq!(arena.stats().mapped_regions, 1);
}

#[test]
fn test_large_releases_do_not_disturb_each_other() {
  let mut arena = arena();
  let heap = arena.allocate(64).unwrap();
  fill(heap, 64, 0xEE);

  let regions: Vec<_> = (0..3u8)
    .map(|i| {
      let ptr = arena.allocate(THRESHOLD + 1024 * i as usize).unwrap();
      fill(ptr, THRESHOLD, i + 1);
      ptr
    })
    .collect();

  unsafe { arena.release(Some(regions[1])) };

  assert!(holds(regions[0], THRESHOLD, 1));
  assert!(holds(regions[2], THRESHOLD, 3));
  assert!(holds(heap, 64, 0xEE));
  assert_eq!(arena.blocks().count(), 1);
  assert_eq!(arena.stats().mapped_regions, 2);
}

#[test]
fn test_zero_allocate_clears_reused_memory() {
  let mut arena = arena();
  let dirty = arena.allocate(THRESHOLD / 2).unwrap();
  fill(dirty, THRESHOLD / 2, 0xFF);
  unsafe { arena.release(Some(dirty)) };

  let zeroed = arena.zero_allocate(10, 10).unwrap();

  assert_eq!(zeroed, dirty);
  assert!(holds(zeroed, 100, 0));
}

#[test]
fn test_zero_allocate_maps_from_the_page_size() {
  let mut arena = arena();
  let page = arena.source().page_size();

  let heap = arena.allocate(page).unwrap();
  assert_eq!(arena.stats().mapped_regions, 0);

  let mapped = arena.zero_allocate(1, page).unwrap();
  assert_eq!(arena.stats().mapped_regions, 1);
  assert!(holds(mapped, page, 0));

  let small = arena.zero_allocate(1, page - HEADER_SIZE - 8).unwrap();
  assert_eq!(arena.stats().mapped_regions, 1);
  assert_ne!(small, heap);
}

#[test]
fn test_zero_allocate_first_preallocates() {
  let mut arena = arena();

  let ptr = arena.zero_allocate(10, 10).unwrap();

  assert!(holds(ptr, 100, 0));
  assert_eq!(block_at(&arena, ptr).size, THRESHOLD - HEADER_SIZE);
  assert_eq!(arena.stats().heap_bytes, THRESHOLD);
  assert_eq!(arena.stats().mapped_regions, 0);
}

#[test]
fn test_zero_allocate_first_below_page_but_above_threshold() {
  let source = ReservedHeap::with_capacity(1 << 20).unwrap();
  let mut arena = ArenaAllocator::try_with_config(source, ArenaConfig::new(1024)).unwrap();
  let page = arena.source().page_size();

  let zeroed = arena.zero_allocate(1, 2000).unwrap();
  assert!(unsafe { arena.usable_size(zeroed) } >= 2000);
  assert!(holds(zeroed, 2000, 0));
  assert_eq!(arena.stats().mapped_regions, 0);
  assert_eq!(arena.stats().heap_bytes, 2000 + HEADER_SIZE);

  let plain = arena.allocate(2000).unwrap();
  assert_eq!(arena.stats().mapped_regions, 1);

  let paged = arena.zero_allocate(1, page).unwrap();
  assert_eq!(arena.stats().mapped_regions, 2);

  let small = arena.zero_allocate(1, 1500).unwrap();
  assert!(holds(small, 1500, 0));
  assert_eq!(arena.stats().mapped_regions, 2);
  assert!(arena.validate().is_ok());

  unsafe {
    arena.release(Some(plain));
    arena.release(Some(paged));
  }
  assert_eq!(arena.stats().mapped_regions, 0);
}

#[test]
fn test_resize_null_first_follows_the_threshold() {
  let source = ReservedHeap::with_capacity(1 << 16).unwrap();
  let mut arena = ArenaAllocator::try_with_config(source, ArenaConfig::new(1024)).unwrap();

  let mapped = unsafe { arena.resize(None, 2000) }.unwrap();
  assert_eq!(arena.blocks().count(), 0);
  assert_eq!(arena.stats().mapped_regions, 1);

  let heap = unsafe { arena.resize(None, 100) }.unwrap();
  assert_eq!(block_at(&arena, heap).size, 1024 - HEADER_SIZE);
  assert_eq!(arena.stats().heap_bytes, 1024);

  unsafe { arena.release(Some(mapped)) };
  assert_eq!(arena.stats().mapped_regions, 0);
}

#[test]
fn test_resize_null_allocates_and_zero_releases() {
  let mut arena = arena();

  let ptr = unsafe { arena.resize(None, 64) }.unwrap();
  assert_eq!(arena.blocks().count(), 1);

  assert!(unsafe { arena.resize(Some(ptr), 0) }.is_none());
  assert_eq!(arena.blocks().next().unwrap().status, Status::Free);
}

#[test]
fn test_resize_shrinks_in_place_and_frees_the_surplus() {
  let mut arena = arena();
  let ptr = arena.allocate(100).unwrap();
  fill(ptr, 64, 0x42);

  let shrunk = unsafe { arena.resize(Some(ptr), 64) }.unwrap();

  assert_eq!(shrunk, ptr);
  assert!(holds(shrunk, 64, 0x42));
  let blocks: Vec<_> = arena.blocks().collect();
  assert_eq!(blocks[0].size, 64);
  assert_eq!(blocks[1].status, Status::Free);
  assert_eq!(blocks[1].size, THRESHOLD - HEADER_SIZE - 64 - HEADER_SIZE);
}

#[test]
fn test_resize_keeps_small_surplus() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let ptr = arena.allocate(64).unwrap();

  let same = unsafe { arena.resize(Some(ptr), 48) }.unwrap();

  assert_eq!(same, ptr);
  assert_eq!(unsafe { arena.usable_size(same) }, 64);
  assert_eq!(arena.blocks().count(), 2);
}

#[test]
fn test_resize_grows_the_last_block_in_place() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let ptr = arena.allocate(64).unwrap();
  fill(ptr, 64, 0x7A);
  let before = arena.stats().heap_bytes;

  let grown = unsafe { arena.resize(Some(ptr), 1024) }.unwrap();

  assert_eq!(grown, ptr);
  assert!(holds(grown, 64, 0x7A));
  assert_eq!(unsafe { arena.usable_size(grown) }, 1024);
  assert_eq!(arena.stats().heap_bytes, before + 960);
}

#[test]
fn test_resize_absorbs_a_free_successor() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let a = arena.allocate(64).unwrap();
  let b = arena.allocate(256).unwrap();
  arena.allocate(8).unwrap();
  fill(a, 64, 0x33);
  unsafe { arena.release(Some(b)) };
  let before = arena.stats().heap_bytes;

  let grown = unsafe { arena.resize(Some(a), 200) }.unwrap();

  assert_eq!(grown, a);
  assert!(holds(grown, 64, 0x33));
  assert_eq!(block_at(&arena, a).size, 200);
  let remainder = arena.blocks().nth(2).unwrap();
  assert_eq!(remainder.status, Status::Free);
  assert_eq!(remainder.size, 64 + HEADER_SIZE + 256 - 200 - HEADER_SIZE);
  assert_eq!(arena.stats().heap_bytes, before);
  assert!(arena.validate().is_ok());
}

#[test]
fn test_resize_absorbs_a_free_tail_and_extends_the_heap() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let a = arena.allocate(64).unwrap();
  let b = arena.allocate(32).unwrap();
  fill(a, 64, 0x44);
  unsafe { arena.release(Some(b)) };
  let before = arena.stats().heap_bytes;

  let grown = unsafe { arena.resize(Some(a), 512) }.unwrap();

  assert_eq!(grown, a);
  assert!(holds(grown, 64, 0x44));
  assert_eq!(block_at(&arena, a).size, 512);
  assert_eq!(arena.blocks().count(), 2);
  assert_eq!(arena.stats().heap_bytes, before + 512 - (64 + HEADER_SIZE + 32));
}

#[test]
fn test_resize_relocates_past_an_allocated_successor() {
  let mut arena = arena();
  arena.allocate(100).unwrap();
  let a = arena.allocate(50).unwrap();
  let b = arena.allocate(64).unwrap();
  fill(a, 50, 0x5C);
  fill(b, 64, 0xB0);

  let moved = unsafe { arena.resize(Some(a), 5000) }.unwrap();

  assert_ne!(moved, a);
  assert!(holds(moved, 50, 0x5C));
  assert!(holds(b, 64, 0xB0));
  assert_eq!(block_at(&arena, a).status, Status::Free);
  assert_eq!(block_at(&arena, moved).size, 5000);
}

#[test]
fn test_resize_moves_mapped_contents() {
  let mut arena = arena();
  let ptr = arena.allocate(200_000).unwrap();
  fill(ptr, 200_000, 0x99);

  let grown = unsafe { arena.resize(Some(ptr), 300_000) }.unwrap();
  assert!(holds(grown, 200_000, 0x99));
  assert_eq!(arena.stats().mapped_regions, 1);
  assert_eq!(arena.stats().mapped_bytes, 300_000 + HEADER_SIZE);

  let shrunk = unsafe { arena.resize(Some(grown), 100) }.unwrap();
  assert!(holds(shrunk, 100, 0x99));
  assert_eq!(arena.stats().mapped_regions, 0);
  assert_eq!(arena.blocks().count(), 1);
}

#[test]
fn test_exhausted_heap_fails_without_damage() {
  let source = ReservedHeap::with_capacity(THRESHOLD + 256).unwrap();
  let mut arena = ArenaAllocator::new(source);
  arena.allocate(100).unwrap();
  let ptr = arena.allocate(64).unwrap();
  fill(ptr, 64, 0x21);

  assert!(unsafe { arena.resize(Some(ptr), 1024) }.is_none());
  assert!(arena.allocate(512).is_none());

  assert!(holds(ptr, 64, 0x21));
  assert_eq!(unsafe { arena.usable_size(ptr) }, 64);
  assert_eq!(arena.blocks().count(), 2);
  assert!(arena.validate().is_ok());

  let still_fits = arena.allocate(64).unwrap();
  assert!(holds(ptr, 64, 0x21));
  unsafe { arena.release(Some(still_fits)) };
}
