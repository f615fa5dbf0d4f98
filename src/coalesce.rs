//! Splitting oversized blocks and merging free neighbours.

use log::trace;

use crate::{
  align,
  block::{BlockRef, HEADER_SIZE, Status},
  directory::Directory,
};

impl Directory {
  /// Shrinks `block` to `size` bytes and turns the surplus into a free block
  /// linked right after it.
  ///
  /// The caller guarantees a surplus of at least
  /// [`MIN_SPLIT_SURPLUS`](crate::block::MIN_SPLIT_SURPLUS).
  pub(crate) fn split(
    &mut self,
    block: BlockRef,
    size: usize,
  ) -> BlockRef {
    let size = align!(size);
    let surplus = block.size() - size - HEADER_SIZE;

    let remainder = unsafe { block.carve(size, surplus, Status::Free) };
    self.insert_after(block, remainder);

    block.set_size(size);
    block.set_status(Status::Allocated);
    trace!("split {:#x}: kept {size} bytes, freed {surplus}", block.addr());

    self.coalesce(remainder);
    block
  }

  /// Merges a free `block` with any free neighbour and returns the survivor.
  pub(crate) fn coalesce(
    &mut self,
    block: BlockRef,
  ) -> BlockRef {
    let mut current = block;

    if let Some(prev) = current.prev().filter(|prev| prev.is_free()) {
      self.absorb_next(prev);
      current = prev;
    }

    if current.next().is_some_and(BlockRef::is_free) {
      self.absorb_next(current);
    }

    current
  }

  /// Folds the block after `block`, header included, into `block`.
  pub(crate) fn absorb_next(
    &mut self,
    block: BlockRef,
  ) {
    let Some(next) = block.next() else {
      return;
    };

    trace!("absorbing {:#x} ({} bytes) into {:#x}", next.addr(), next.size(), block.addr());
    self.unlink(next);
    block.set_size(block.size() + HEADER_SIZE + next.size());
  }
}
