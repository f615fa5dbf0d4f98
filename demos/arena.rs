use std::{
  alloc::{GlobalAlloc, Layout},
  io::Read,
  ptr,
};

use brkalloc::{ArenaStats, GlobalArena};
use libc::sbrk;

// Every allocation in this program, ours and the standard library's, goes
// through the arena.
#[global_allocator]
static GLOBAL: GlobalArena = GlobalArena::new();

/// Waits until the user presses ENTER when the demo runs with `--step`.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just watch how the program break moves.
fn pause(
  step: bool,
) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn stats() -> ArenaStats {
  unsafe { GLOBAL.with(|arena| arena.stats()) }
}

/// Prints the current program break and what the arena holds.
fn report(
  label: &str,
) {
  let stats = stats();
  println!(
    "[{}] break = {:?}, heap = {} bytes, mappings = {} ({} bytes)",
    label,
    unsafe { sbrk(0) },
    stats.heap_bytes,
    stats.mapped_regions,
    stats.mapped_bytes,
  );
}

fn main() {
  let step = std::env::args().any(|arg| arg == "--step");

  unsafe {
    report("start");
    pause(step);

    // --------------------------------------------------------------------
    // 1) A first small allocation claims the whole 128 KiB heap region.
    // --------------------------------------------------------------------
    let layout_u64 = Layout::new::<u64>();
    let first = GLOBAL.alloc(layout_u64);
    first.cast::<u64>().write(0x1122334455667788);
    println!("\n[1] u64 at {:?} = {:#X}", first, first.cast::<u64>().read());
    report("1");
    pause(step);

    // --------------------------------------------------------------------
    // 2) Release it, then ask for 40 bytes: the freed block is reused and
    //    its surplus split off.
    // --------------------------------------------------------------------
    GLOBAL.dealloc(first, layout_u64);
    let layout_40 = Layout::array::<u8>(40).unwrap();
    let second = GLOBAL.alloc(layout_40);
    ptr::write_bytes(second, 0xAB, 40);
    println!("\n[2] 40 bytes at {:?}, reused first block? {}", second, second == first);
    report("2");
    pause(step);

    // --------------------------------------------------------------------
    // 3) Grow it in place over the free remainder.
    // --------------------------------------------------------------------
    let grown = GLOBAL.realloc(second, layout_40, 4000);
    println!("\n[3] grown to 4000 bytes at {:?}, moved? {}", grown, grown != second);
    println!("[3] first byte still {:#X}", *grown);
    report("3");
    pause(step);

    // --------------------------------------------------------------------
    // 4) A large object gets its own mapping; the heap doesn't move.
    // --------------------------------------------------------------------
    let layout_big = Layout::array::<u8>(200_000).unwrap();
    let big = GLOBAL.alloc(layout_big);
    ptr::write_bytes(big, 0xCD, 200_000);
    println!("\n[4] 200000 bytes at {:?}", big);
    report("4");
    GLOBAL.dealloc(big, layout_big);
    report("4, released");
    pause(step);

    // --------------------------------------------------------------------
    // 5) Zeroed allocations switch to the mapping at one page.
    // --------------------------------------------------------------------
    let page = Layout::array::<u8>(4096).unwrap();
    let zeroed = GLOBAL.alloc_zeroed(page);
    println!("\n[5] zeroed page at {:?}, all zero? {}", zeroed, (0..4096).all(|i| *zeroed.add(i) == 0));
    report("5");
    GLOBAL.dealloc(zeroed, page);

    // --------------------------------------------------------------------
    // 6) Ordinary collections work too.
    // --------------------------------------------------------------------
    let words: Vec<String> = (0..16).map(|i| format!("word-{i}")).collect();
    println!("\n[6] {} strings, last = {}", words.len(), words[15]);
    report("6");

    GLOBAL.dealloc(grown, Layout::array::<u8>(4000).unwrap());
  }

  println!("\n[7] End of example. Process will exit and the OS will reclaim all memory.");
}
