//! Where the allocator gets its memory from.
//!
//! ```text
//!   MemorySource
//!   ├── SystemMemory  - sbrk(2) for the heap, mmap(2) for large objects
//!   └── ReservedHeap  - a private break inside one reserved mapping,
//!                       mmap(2) for large objects
//! ```

use std::ptr::{self, NonNull};

use libc::{c_void, intptr_t};
use log::{debug, warn};

use crate::{align, align::ALIGNMENT, error::AllocError};

/// The raw memory primitives the allocator is built on.
///
/// Implementations must behave like a program break: consecutive successful
/// [`extend`](MemorySource::extend) calls return contiguous, ascending
/// regions, and the returned addresses are aligned to [`ALIGNMENT`].
pub trait MemorySource {
  /// Moves the top of the heap up by `increment` bytes and returns the
  /// previous top, which is where the new bytes start.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError>;

  /// Creates an independent read/write anonymous mapping of `len` bytes.
  fn map(
    &mut self,
    len: usize,
  ) -> Result<NonNull<u8>, AllocError>;

  /// Releases a mapping created by [`map`](MemorySource::map).
  ///
  /// # Safety
  ///
  /// `addr` and `len` must describe exactly one live mapping returned by this
  /// source, and nothing may touch it afterwards.
  unsafe fn unmap(
    &mut self,
    addr: NonNull<u8>,
    len: usize,
  );

  /// Current page size. Queried on every zero-allocate.
  fn page_size(&self) -> usize;
}

fn map_anonymous(
  len: usize,
) -> Result<NonNull<u8>, AllocError> {
  let addr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      len,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if addr == libc::MAP_FAILED {
    return Err(AllocError::MapFailed { len });
  }

  debug!("mapped {len} bytes at {addr:?}");
  NonNull::new(addr.cast::<u8>()).ok_or(AllocError::MapFailed { len })
}

unsafe fn unmap_region(
  addr: NonNull<u8>,
  len: usize,
) {
  if unsafe { libc::munmap(addr.as_ptr().cast::<c_void>(), len) } != 0 {
    warn!("munmap of {len} bytes at {addr:?} failed");
  } else {
    debug!("unmapped {len} bytes at {addr:?}");
  }
}

fn system_page_size() -> usize {
  match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
    size if size > 0 => size as usize,
    _ => 4096,
  }
}

/// The process data segment and the kernel's anonymous mappings.
///
/// Assumes nothing else in the process moves the program break. Install the
/// allocator as the only user of `sbrk`, for example through
/// [`GlobalArena`](crate::GlobalArena).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMemory;

impl SystemMemory {
  pub const fn new() -> Self {
    Self
  }

  fn sbrk(
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let exhausted = AllocError::HeapExhausted { requested: increment };
    let delta = intptr_t::try_from(increment).map_err(|_| exhausted.clone())?;

    let address = unsafe { libc::sbrk(delta) };

    if address == usize::MAX as *mut c_void {
      return Err(exhausted);
    }

    NonNull::new(address.cast::<u8>()).ok_or(exhausted)
  }
}

impl MemorySource for SystemMemory {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let current = Self::sbrk(0)?.as_ptr() as usize;
    let padding = align!(current) - current;

    if padding != 0 {
      debug!("padding misaligned break {current:#x} by {padding} bytes");
      Self::sbrk(padding)?;
    }

    let old_break = Self::sbrk(increment)?;
    debug!("moved break up by {increment} bytes from {old_break:?}");
    Ok(old_break)
  }

  fn map(
    &mut self,
    len: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    map_anonymous(len)
  }

  unsafe fn unmap(
    &mut self,
    addr: NonNull<u8>,
    len: usize,
  ) {
    unsafe { unmap_region(addr, len) }
  }

  fn page_size(&self) -> usize {
    system_page_size()
  }
}

/// A private heap of fixed capacity.
///
/// Reserves one anonymous mapping up front and moves its own break inside
/// it, so several arenas can live in one process (and in one test binary)
/// without fighting over the real program break.
#[derive(Debug)]
pub struct ReservedHeap {
  base: NonNull<u8>,
  brk: usize,
  capacity: usize,
}

impl ReservedHeap {
  /// Default reservation: 64 MiB.
  pub const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

  pub fn new() -> Result<Self, AllocError> {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }

  /// Reserve `capacity` bytes (rounded up to the alignment unit).
  pub fn with_capacity(
    capacity: usize,
  ) -> Result<Self, AllocError> {
    let capacity = align::align_up(capacity).ok_or(AllocError::SizeOverflow { requested: capacity })?;
    let base = map_anonymous(capacity.max(ALIGNMENT))?;

    Ok(Self {
      base,
      brk: 0,
      capacity,
    })
  }

  /// Start of the reserved region; the first heap block lands here.
  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  /// Bytes below the private break.
  pub fn used(&self) -> usize {
    self.brk
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl MemorySource for ReservedHeap {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let exhausted = AllocError::HeapExhausted { requested: increment };

    match self.brk.checked_add(increment) {
      Some(brk) if brk <= self.capacity => {
        let old_break = unsafe { self.base.as_ptr().add(self.brk) };
        self.brk = brk;
        NonNull::new(old_break).ok_or(exhausted)
      }
      _ => Err(exhausted),
    }
  }

  fn map(
    &mut self,
    len: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    map_anonymous(len)
  }

  unsafe fn unmap(
    &mut self,
    addr: NonNull<u8>,
    len: usize,
  ) {
    unsafe { unmap_region(addr, len) }
  }

  fn page_size(&self) -> usize {
    system_page_size()
  }
}

impl Drop for ReservedHeap {
  fn drop(&mut self) {
    unsafe { unmap_region(self.base, self.capacity.max(ALIGNMENT)) }
  }
}
