//! Finding room for a heap request: best fit, in-place tail growth, or a
//! fresh block at the top of the heap.
//!
//! ```text
//!   find_free_block(size)
//!     │
//!     ├─ Free tail, too small ───────────► extend the break by the deficit
//!     ├─ smallest Free block ≥ size ─────► split if the surplus is worth it
//!     └─ nothing fits ───────────────────► extend the break, append a block
//! ```

use log::{debug, trace};

use crate::{
  align,
  block::{BlockRef, HEADER_SIZE, MIN_SPLIT_SURPLUS, Status},
  directory::Directory,
  error::AllocError,
  source::MemorySource,
};

impl Directory {
  /// Claims the one-time heap region of `extent` bytes as a single
  /// `Allocated` block.
  ///
  /// The payload beyond what the caller asked for is not free space yet; it
  /// becomes reusable once this block is released or split.
  pub(crate) fn preallocate<S: MemorySource>(
    &mut self,
    source: &mut S,
    extent: usize,
  ) -> Result<BlockRef, AllocError> {
    let addr = source.extend(extent)?;
    self.record_growth(extent);

    let block = unsafe { BlockRef::init(addr, extent - HEADER_SIZE, Status::Allocated) };
    self.push_back(block);
    self.mark_preallocated();

    debug!("preallocated {extent} byte heap at {addr:?}");
    Ok(block)
  }

  /// Returns an `Allocated` block holding at least `size` bytes.
  pub(crate) fn find_free_block<S: MemorySource>(
    &mut self,
    source: &mut S,
    size: usize,
  ) -> Result<BlockRef, AllocError> {
    let size = align!(size);
    let mut best_fit: Option<BlockRef> = None;

    for block in self.iter() {
      if block.is_free() && block.size() >= size && best_fit.is_none_or(|best| block.size() < best.size()) {
        best_fit = Some(block);
      }
    }

    // A free tail that is too small wins over any best fit elsewhere.
    if let Some(tail) = self.last().filter(|tail| tail.is_free() && tail.size() < size) {
      self.grow_tail(source, tail, size - tail.size())?;
      tail.set_status(Status::Allocated);
      return Ok(tail);
    }

    if let Some(block) = best_fit {
      trace!("best fit for {size} bytes: {:#x} ({} bytes)", block.addr(), block.size());
      block.set_status(Status::Allocated);

      if block.size() - size >= MIN_SPLIT_SURPLUS {
        return Ok(self.split(block, size));
      }

      return Ok(block);
    }

    self.append(source, size)
  }

  /// Extends the highest-address block in place by `increment` bytes.
  pub(crate) fn grow_tail<S: MemorySource>(
    &mut self,
    source: &mut S,
    tail: BlockRef,
    increment: usize,
  ) -> Result<(), AllocError> {
    debug_assert_eq!(self.last(), Some(tail));

    let old_break = source.extend(increment)?;
    debug_assert_eq!(old_break.as_ptr() as usize, tail.end(), "program break moved underneath the heap");
    self.record_growth(increment);

    tail.set_size(tail.size() + increment);
    trace!("grew tail {:#x} to {} bytes", tail.addr(), tail.size());
    Ok(())
  }

  /// Extends the heap by a new `Allocated` block of `size` bytes.
  fn append<S: MemorySource>(
    &mut self,
    source: &mut S,
    size: usize,
  ) -> Result<BlockRef, AllocError> {
    let extent = size + HEADER_SIZE;
    let addr = source.extend(extent)?;
    self.record_growth(extent);

    let block = unsafe { BlockRef::init(addr, size, Status::Allocated) };
    self.push_back(block);

    trace!("appended {size} byte block at {addr:?}");
    Ok(block)
  }
}
