use std::{marker::PhantomData, ptr, ptr::NonNull};

use log::{trace, warn};

use crate::{
  align::align_up,
  block::{BlockInfo, BlockRef, HEADER_SIZE, MIN_SPLIT_SURPLUS, Status},
  config::ArenaConfig,
  directory::Directory,
  error::AllocError,
  large,
  source::{MemorySource, SystemMemory},
};

/// Which size threshold sends a request down the large-object path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Threshold {
  /// The configured mmap threshold.
  Plain,
  /// The page size, re-read from the source for each zero-allocate.
  ZeroFill,
}

/// Counters describing what the arena holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
  /// Bytes obtained from the top of the heap so far. The heap never shrinks.
  pub heap_bytes: usize,
  /// Live large-object mappings.
  pub mapped_regions: usize,
  /// Bytes held by live large-object mappings, headers included.
  pub mapped_bytes: usize,
  /// Number of zero-allocate requests that reached placement.
  pub zero_fill_calls: usize,
}

/// A single-threaded heap allocator.
///
/// Small requests are placed in an address-ordered list of blocks grown from
/// the top of the heap; requests at or above the mmap threshold each get
/// their own mapping.
///
/// The arena is neither `Send` nor `Sync`: all of its state is unsynchronized
/// and belongs to the thread that created it.
pub struct ArenaAllocator<S: MemorySource = SystemMemory> {
  source: S,
  config: ArenaConfig,
  directory: Directory,
  mapped_regions: usize,
  mapped_bytes: usize,
  zero_fill_calls: usize,
  _unsync: PhantomData<*mut ()>,
}

impl<S: MemorySource> ArenaAllocator<S> {
  /// An empty arena with the default policy. Nothing is requested from
  /// `source` until the first allocation.
  pub const fn new(
    source: S,
  ) -> Self {
    Self {
      source,
      config: ArenaConfig::DEFAULT,
      directory: Directory::new(),
      mapped_regions: 0,
      mapped_bytes: 0,
      zero_fill_calls: 0,
      _unsync: PhantomData,
    }
  }

  pub fn try_with_config(
    source: S,
    config: ArenaConfig,
  ) -> Result<Self, AllocError> {
    config.validate()?;

    let mut arena = Self::new(source);
    arena.config = config;
    Ok(arena)
  }

  pub fn config(&self) -> &ArenaConfig {
    &self.config
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn stats(&self) -> ArenaStats {
    ArenaStats {
      heap_bytes: self.directory.heap_bytes(),
      mapped_regions: self.mapped_regions,
      mapped_bytes: self.mapped_bytes,
      zero_fill_calls: self.zero_fill_calls,
    }
  }

  /// Heap blocks in address order. Large objects are not listed.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.directory.blocks()
  }

  /// Checks the heap directory invariants.
  pub fn validate(&self) -> Result<(), AllocError> {
    self.directory.validate()
  }

  /// Usable bytes behind a pointer returned by this arena.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live allocation of this arena.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { BlockRef::from_payload(ptr) }.capacity()
  }

  /// Allocates at least `size` bytes aligned to
  /// [`ALIGNMENT`](crate::ALIGNMENT).
  ///
  /// Returns `None` for a zero-size request or when the underlying memory
  /// primitive fails.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.allocate_with(size, Threshold::Plain)
  }

  /// Allocates `count * size` bytes, all zero.
  ///
  /// Requests whose aligned size plus a header reach the page size are
  /// mapped rather than placed on the heap. Returns `None` if either argument
  /// is zero or the product overflows.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if count == 0 || size == 0 {
      return None;
    }

    let Some(total) = count.checked_mul(size).and_then(align_up) else {
      warn!("zero-allocate of {count} x {size} bytes overflows");
      return None;
    };

    let payload = self.allocate_with(total, Threshold::ZeroFill)?;
    unsafe { ptr::write_bytes(payload.as_ptr(), 0, total) };
    Some(payload)
  }

  /// Returns an allocation to the arena. `None` is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this arena and not released since.
  pub unsafe fn release(
    &mut self,
    ptr: Option<NonNull<u8>>,
  ) {
    let Some(ptr) = ptr else {
      return;
    };

    let block = unsafe { BlockRef::from_payload(ptr) };

    match block.status() {
      Status::Mapped => {
        self.mapped_regions -= 1;
        self.mapped_bytes -= block.size();
        unsafe { large::unmap_block(&mut self.source, block) };
      }
      Status::Allocated | Status::Free => {
        block.set_status(Status::Free);
        self.directory.coalesce(block);
        self.debug_validate();
      }
    }
  }

  /// Changes the size of an allocation, preserving its first
  /// `min(old, new)` bytes.
  ///
  /// `resize(None, n)` allocates and `resize(ptr, 0)` releases. The block
  /// is kept in place when it can shrink, grow at the top of the heap, or
  /// absorb a free successor; otherwise the contents move to a fresh
  /// allocation. On failure `None` is returned and the original allocation
  /// is untouched.
  ///
  /// # Safety
  ///
  /// A `Some` pointer must be a live allocation of this arena. When the
  /// result differs from `ptr`, `ptr` has been released.
  pub unsafe fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let Some(ptr) = ptr else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.release(Some(ptr)) };
      return None;
    }

    let Some(size) = align_up(size) else {
      warn!("resize to {size} bytes overflows");
      return None;
    };

    let block = unsafe { BlockRef::from_payload(ptr) };

    match self.resize_in_place(block, size) {
      Ok(true) => {
        self.debug_validate();
        Some(ptr)
      }
      Ok(false) => unsafe { self.relocate(block, size) },
      Err(err) => {
        warn!("resize of {:#x} to {size} bytes failed: {err}", block.addr());
        None
      }
    }
  }

  fn threshold(
    &self,
    threshold: Threshold,
  ) -> usize {
    match threshold {
      Threshold::Plain => self.config.mmap_threshold,
      Threshold::ZeroFill => self.source.page_size(),
    }
  }

  fn allocate_with(
    &mut self,
    size: usize,
    threshold: Threshold,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    if threshold == Threshold::ZeroFill {
      self.zero_fill_calls += 1;
    }

    match self.try_allocate(size, threshold) {
      Ok(block) => Some(block.payload()),
      Err(err) => {
        warn!("allocation of {size} bytes failed: {err}");
        None
      }
    }
  }

  fn try_allocate(
    &mut self,
    size: usize,
    threshold: Threshold,
  ) -> Result<BlockRef, AllocError> {
    let overflow = AllocError::SizeOverflow { requested: size };
    let size = align_up(size).ok_or(overflow.clone())?;
    let extent = size.checked_add(HEADER_SIZE).ok_or(overflow)?;

    if extent >= self.threshold(threshold) {
      let block = large::map_block(&mut self.source, size)?;
      self.mapped_regions += 1;
      self.mapped_bytes += block.size();
      return Ok(block);
    }

    let block = if self.directory.is_preallocated() {
      self.directory.find_free_block(&mut self.source, size)?
    } else {
      // A zero-allocate under a page size larger than the threshold can
      // reach here with more than the threshold holds.
      self.directory.preallocate(&mut self.source, self.config.mmap_threshold.max(extent))?
    };

    self.debug_validate();
    Ok(block)
  }

  /// Tries every in-place strategy in order. `Ok(false)` means the block
  /// has to move.
  fn resize_in_place(
    &mut self,
    block: BlockRef,
    size: usize,
  ) -> Result<bool, AllocError> {
    if block.status() != Status::Allocated {
      return Ok(false);
    }

    let threshold = self.config.mmap_threshold;
    let current = block.size();

    if size <= current {
      if size >= threshold {
        return Ok(false);
      }

      if current - size >= MIN_SPLIT_SURPLUS {
        self.directory.split(block, size);
      }

      trace!("resized {:#x} in place from {current} to {size} bytes", block.addr());
      return Ok(true);
    }

    match block.next() {
      None => {
        self.directory.grow_tail(&mut self.source, block, size - current)?;
        Ok(true)
      }
      Some(next) if size < threshold && next.is_free() => self.absorb_free_successor(block, next, size),
      // The successor belongs to a live allocation; its bytes can't be taken over.
      Some(_) => Ok(false),
    }
  }

  /// Grows `block` over the free block right after it, extending the heap
  /// first when that free block is the tail and still too small.
  fn absorb_free_successor(
    &mut self,
    block: BlockRef,
    next: BlockRef,
    size: usize,
  ) -> Result<bool, AllocError> {
    let combined = block.size() + HEADER_SIZE + next.size();

    if combined >= size {
      self.directory.absorb_next(block);

      if block.size() - size >= MIN_SPLIT_SURPLUS {
        self.directory.split(block, size);
      }

      return Ok(true);
    }

    if next.next().is_none() {
      self.directory.grow_tail(&mut self.source, next, size - combined)?;
      self.directory.absorb_next(block);
      return Ok(true);
    }

    Ok(false)
  }

  /// Moves the contents of `block` into a fresh allocation of `size` bytes
  /// and releases `block`.
  unsafe fn relocate(
    &mut self,
    block: BlockRef,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let fresh = self.allocate(size)?;
    let preserved = block.capacity().min(size);

    trace!("relocating {:#x} to {fresh:?}, copying {preserved} bytes", block.addr());

    unsafe {
      ptr::copy_nonoverlapping(block.payload().as_ptr(), fresh.as_ptr(), preserved);
      self.release(Some(block.payload()));
    }

    Some(fresh)
  }

  fn debug_validate(&self) {
    debug_assert_eq!(self.directory.validate(), Ok(()));
  }
}

impl Default for ArenaAllocator<SystemMemory> {
  fn default() -> Self {
    Self::new(SystemMemory::new())
  }
}
