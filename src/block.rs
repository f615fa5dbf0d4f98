//! Block headers and the handle type every other module works through.
//!
//! This is the only module that turns addresses into headers. Constructing a
//! [`BlockRef`] is `unsafe`; once a handle exists, reading and relinking it is
//! not.

use std::{mem, ptr, ptr::NonNull};

use static_assertions::{const_assert, const_assert_eq};

use crate::align::ALIGNMENT;

/// State of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
  /// Heap-resident and available for placement.
  Free,
  /// Heap-resident and handed out.
  Allocated,
  /// A standalone anonymous mapping, never linked into the directory.
  Mapped,
}

#[repr(C)]
pub(crate) struct BlockHeader {
  /// Payload bytes for heap blocks, total mapped extent for mapped blocks.
  size: usize,
  status: Status,
  prev: *mut BlockHeader,
  next: *mut BlockHeader,
}

impl BlockHeader {
  fn new(
    size: usize,
    status: Status,
  ) -> Self {
    Self {
      size,
      status,
      prev: ptr::null_mut(),
      next: ptr::null_mut(),
    }
  }
}

/// Bytes of metadata in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

const_assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
const_assert!(mem::align_of::<BlockHeader>() <= ALIGNMENT);

/// Smallest surplus worth carving into its own free block.
pub const MIN_SPLIT_SURPLUS: usize = ALIGNMENT + HEADER_SIZE;

/// Read-only snapshot of one heap block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the first payload byte.
  pub payload: usize,
  /// Usable payload bytes.
  pub size: usize,
  /// Whether the block is free or in use.
  pub status: Status,
}

/// Handle to a live block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockRef(NonNull<BlockHeader>);

impl BlockRef {
  /// Writes a fresh, unlinked header at `addr`.
  ///
  /// # Safety
  ///
  /// `addr` must be aligned to [`ALIGNMENT`] and point to at least
  /// `HEADER_SIZE` writable bytes owned by the allocator.
  pub unsafe fn init(
    addr: NonNull<u8>,
    size: usize,
    status: Status,
  ) -> Self {
    let header = addr.cast::<BlockHeader>();
    unsafe { header.as_ptr().write(BlockHeader::new(size, status)) };
    Self(header)
  }

  /// Recovers the header in front of a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`BlockRef::payload`] on a block
  /// that is still live.
  pub unsafe fn from_payload(
    payload: NonNull<u8>,
  ) -> Self {
    let header = unsafe { payload.as_ptr().sub(HEADER_SIZE) };
    Self(unsafe { NonNull::new_unchecked(header.cast()) })
  }

  /// Writes a new header `offset` bytes into this block's payload.
  ///
  /// # Safety
  ///
  /// `offset` must be aligned and `offset + HEADER_SIZE + size` must not
  /// exceed this block's payload.
  pub unsafe fn carve(
    self,
    offset: usize,
    size: usize,
    status: Status,
  ) -> BlockRef {
    debug_assert!(offset + HEADER_SIZE + size <= self.size());
    let addr = unsafe { self.payload().as_ptr().add(offset) };
    unsafe { Self::init(NonNull::new_unchecked(addr), size, status) }
  }

  fn from_raw(
    raw: *mut BlockHeader,
  ) -> Option<Self> {
    NonNull::new(raw).map(Self)
  }

  fn raw(
    link: Option<BlockRef>,
  ) -> *mut BlockHeader {
    link.map_or(ptr::null_mut(), |block| block.0.as_ptr())
  }

  pub fn header(self) -> NonNull<u8> {
    self.0.cast()
  }

  pub fn payload(self) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(self.0.as_ptr().cast::<u8>().add(HEADER_SIZE)) }
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// First address past the payload.
  pub fn end(self) -> usize {
    self.payload().as_ptr() as usize + self.capacity()
  }

  pub fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  pub fn set_size(
    self,
    size: usize,
  ) {
    unsafe { (*self.0.as_ptr()).size = size };
  }

  /// Usable payload bytes, whichever way the size is recorded.
  pub fn capacity(self) -> usize {
    match self.status() {
      Status::Mapped => self.size() - HEADER_SIZE,
      Status::Free | Status::Allocated => self.size(),
    }
  }

  pub fn status(self) -> Status {
    unsafe { (*self.0.as_ptr()).status }
  }

  pub fn set_status(
    self,
    status: Status,
  ) {
    unsafe { (*self.0.as_ptr()).status = status };
  }

  pub fn is_free(self) -> bool {
    self.status() == Status::Free
  }

  pub fn prev(self) -> Option<BlockRef> {
    Self::from_raw(unsafe { (*self.0.as_ptr()).prev })
  }

  pub fn set_prev(
    self,
    prev: Option<BlockRef>,
  ) {
    unsafe { (*self.0.as_ptr()).prev = Self::raw(prev) };
  }

  pub fn next(self) -> Option<BlockRef> {
    Self::from_raw(unsafe { (*self.0.as_ptr()).next })
  }

  pub fn set_next(
    self,
    next: Option<BlockRef>,
  ) {
    unsafe { (*self.0.as_ptr()).next = Self::raw(next) };
  }

  pub fn info(self) -> BlockInfo {
    BlockInfo {
      payload: self.payload().as_ptr() as usize,
      size: self.capacity(),
      status: self.status(),
    }
  }
}
