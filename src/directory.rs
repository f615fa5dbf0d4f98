//! The block directory: every heap-resident block, in address order.
//!
//! ```text
//!   first                                                   last
//!     │                                                       │
//!     ▼                                                       ▼
//!   ┌────────┬─────────┐   ┌────────┬──────┐   ┌────────┬─────────────┐
//!   │ header │ payload │ ⇄ │ header │ free │ ⇄ │ header │   payload   │
//!   └────────┴─────────┘   └────────┴──────┘   └────────┴─────────────┘
//!                                                                      ▲
//!                                                                    break
//! ```

use std::iter;

use crate::{
  block::{BlockInfo, BlockRef, Status},
  error::AllocError,
};

pub(crate) struct Directory {
  first: Option<BlockRef>,
  last: Option<BlockRef>,
  preallocated: bool,
  /// Bytes ever obtained from the top-of-heap primitive.
  heap_bytes: usize,
}

impl Directory {
  pub const fn new() -> Self {
    Self {
      first: None,
      last: None,
      preallocated: false,
      heap_bytes: 0,
    }
  }

  pub fn last(&self) -> Option<BlockRef> {
    self.last
  }

  pub fn is_preallocated(&self) -> bool {
    self.preallocated
  }

  pub(crate) fn mark_preallocated(&mut self) {
    self.preallocated = true;
  }

  pub fn heap_bytes(&self) -> usize {
    self.heap_bytes
  }

  pub(crate) fn record_growth(
    &mut self,
    bytes: usize,
  ) {
    self.heap_bytes += bytes;
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = BlockRef> + '_ {
    iter::successors(self.first, |block| block.next())
  }

  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.iter().map(BlockRef::info)
  }

  /// Links `block` as the new highest-address block.
  pub(crate) fn push_back(
    &mut self,
    block: BlockRef,
  ) {
    block.set_prev(self.last);
    block.set_next(None);

    match self.last {
      Some(last) => last.set_next(Some(block)),
      None => self.first = Some(block),
    }

    self.last = Some(block);
  }

  /// Links `block` directly after `anchor`.
  pub(crate) fn insert_after(
    &mut self,
    anchor: BlockRef,
    block: BlockRef,
  ) {
    let next = anchor.next();

    block.set_prev(Some(anchor));
    block.set_next(next);

    match next {
      Some(next) => next.set_prev(Some(block)),
      None => self.last = Some(block),
    }

    anchor.set_next(Some(block));
  }

  /// Drops `block` from the list. Its memory is left to whoever absorbs it.
  pub(crate) fn unlink(
    &mut self,
    block: BlockRef,
  ) {
    let prev = block.prev();
    let next = block.next();

    match prev {
      Some(prev) => prev.set_next(next),
      None => self.first = next,
    }

    match next {
      Some(next) => next.set_prev(prev),
      None => self.last = prev,
    }

    block.set_prev(None);
    block.set_next(None);
  }

  /// Walks the whole list and checks the directory invariants.
  pub fn validate(&self) -> Result<(), AllocError> {
    let mut previous: Option<BlockRef> = None;

    for block in self.iter() {
      let corrupted = |reason| AllocError::Corrupted {
        addr: block.addr(),
        reason,
      };

      if block.size() % crate::align::ALIGNMENT != 0 {
        return Err(corrupted("size is not aligned"));
      }

      if block.status() == Status::Mapped {
        return Err(corrupted("mapped block linked into the heap"));
      }

      if block.prev() != previous {
        return Err(corrupted("back link does not match the walk"));
      }

      if let Some(previous) = previous {
        if block.addr() < previous.end() {
          return Err(corrupted("overlaps or precedes its predecessor"));
        }

        if block.is_free() && previous.is_free() {
          return Err(corrupted("adjacent free blocks"));
        }
      }

      previous = Some(block);
    }

    if previous != self.last {
      let addr = self.last.map_or(0, BlockRef::addr);
      return Err(AllocError::Corrupted {
        addr,
        reason: "cached tail is not the last block",
      });
    }

    Ok(())
  }
}

#[cfg(test)]
impl Directory {
  /// Lays `blocks` out back to back in `buf` and links them in order.
  pub(crate) fn lay_out(
    buf: &mut [u64],
    blocks: &[(usize, Status)],
  ) -> (Self, Vec<BlockRef>) {
    let mut directory = Self::new();
    let mut refs = Vec::new();
    let mut offset = 0;

    for &(size, status) in blocks {
      let addr = unsafe { buf.as_mut_ptr().cast::<u8>().add(offset) };
      let addr = std::ptr::NonNull::new(addr).unwrap();
      let block = unsafe { BlockRef::init(addr, size, status) };
      directory.push_back(block);
      refs.push(block);
      offset += crate::block::HEADER_SIZE + size;
    }

    (directory, refs)
  }
}
