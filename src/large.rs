//! Requests at or above the threshold skip the heap: each one gets its own
//! anonymous mapping, headed by a `Mapped` block that is never linked.

use log::trace;

use crate::{
  block::{BlockRef, HEADER_SIZE, Status},
  error::AllocError,
  source::MemorySource,
};

/// Maps `size + HEADER_SIZE` bytes and stamps a `Mapped` header on them.
pub(crate) fn map_block<S: MemorySource>(
  source: &mut S,
  size: usize,
) -> Result<BlockRef, AllocError> {
  let extent = size
    .checked_add(HEADER_SIZE)
    .ok_or(AllocError::SizeOverflow { requested: size })?;
  let addr = source.map(extent)?;

  trace!("large object of {size} bytes at {addr:?}");
  Ok(unsafe { BlockRef::init(addr, extent, Status::Mapped) })
}

/// Unmaps the full recorded extent of a `Mapped` block.
///
/// # Safety
///
/// `block` must be a live mapped block; its payload is gone afterwards.
pub(crate) unsafe fn unmap_block<S: MemorySource>(
  source: &mut S,
  block: BlockRef,
) {
  debug_assert_eq!(block.status(), Status::Mapped);

  let extent = block.size();
  block.set_status(Status::Free);
  unsafe { source.unmap(block.header(), extent) };
}
