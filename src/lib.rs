//! # brkalloc - A Best-Fit Heap Allocator
//!
//! This crate provides a drop-in replacement for the `malloc` family built
//! directly on two operating-system primitives: the program break (`sbrk(2)`)
//! for small objects and anonymous mappings (`mmap(2)`) for large ones.
//!
//! ## Overview
//!
//! ```text
//!   Request routing:
//!
//!   allocate(n) ─────┐
//!   zero_allocate ───┤     n + header < threshold?
//!   resize ──────────┤          │
//!                    ▼          ├── yes ──► heap (best fit, split, coalesce)
//!                  align(n)     │
//!                               └── no ───► one mmap per request
//!
//!   threshold = 128 KiB for allocate/resize, page size for zero_allocate
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Alignment unit and the align! macro
//!   ├── block      - Block header layout and handles (internal)
//!   ├── directory  - Address-ordered block list (internal)
//!   ├── placement  - Best fit, tail growth, heap extension (internal)
//!   ├── coalesce   - Splitting and merging (internal)
//!   ├── large      - Mapped large objects (internal)
//!   ├── arena      - ArenaAllocator: allocate, zero_allocate, resize, release
//!   ├── source     - MemorySource, SystemMemory, ReservedHeap
//!   ├── config     - ArenaConfig
//!   ├── error      - AllocError
//!   ├── global     - GlobalArena (#[global_allocator] adapter)
//!   └── ffi        - os_malloc & co. (feature "c-abi")
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{ArenaAllocator, ReservedHeap};
//!
//! let mut arena = ArenaAllocator::new(ReservedHeap::new().unwrap());
//!
//! let ptr = arena.allocate(64).unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(0xAB, 64);
//!
//!   let grown = arena.resize(Some(ptr), 256).unwrap();
//!   assert_eq!(*grown.as_ptr().add(63), 0xAB);
//!
//!   arena.release(Some(grown));
//! }
//! ```
//!
//! ## How It Works
//!
//! The first small request claims one 128 KiB region from the top of the
//! heap and hands it out whole. Released blocks become free space that later
//! requests are carved from:
//!
//! ```text
//!   Heap after a few allocations and frees:
//!
//!   ┌────────┬──────────┬────────┬────────┬────────┬──────────────┐
//!   │ header │  alloc   │ header │  free  │ header │    alloc     │
//!   │ 32 B   │          │ 32 B   │        │ 32 B   │              │
//!   └────────┴──────────┴────────┴────────┴────────┴──────────────┘
//!            ▲                                                    ▲
//!            └── pointer returned to user                   program break
//!
//!   allocate  → a free last block that is too small grows in place
//!             → else smallest free block that fits; surplus ≥ 8 + header is split off
//!             → no fit: append a new block
//!   release   → mark free, merge with free neighbours
//!   resize    → shrink in place, grow at the top of the heap, absorb a free
//!               successor, or move
//! ```
//!
//! Large objects carry the same header but are never linked into the heap:
//!
//! ```text
//!   ┌────────┬─────────────────────────────────┐
//!   │ Mapped │            payload              │   one mmap, unmapped whole
//!   └────────┴─────────────────────────────────┘
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives; an
//!   [`ArenaAllocator`] is neither `Send` nor `Sync`
//! - **8-byte alignment**: Stricter alignments are not supported
//! - **The heap never shrinks**: Freed heap memory is reused, not returned
//! - **Unix-only**: Requires `libc`, `sbrk` and `mmap`
//!
//! ## Safety
//!
//! Releasing or resizing a pointer this allocator did not return, or
//! releasing twice, is undefined behaviour. Those operations are `unsafe`.

pub mod align;
mod arena;
mod block;
mod coalesce;
pub mod config;
mod directory;
pub mod error;
#[cfg(feature = "c-abi")]
pub mod ffi;
mod global;
mod large;
mod placement;
pub mod source;

pub use align::ALIGNMENT;
pub use arena::{ArenaAllocator, ArenaStats};
pub use block::{BlockInfo, HEADER_SIZE, MIN_SPLIT_SURPLUS, Status};
pub use config::ArenaConfig;
pub use error::AllocError;
pub use global::GlobalArena;
pub use source::{MemorySource, ReservedHeap, SystemMemory};
