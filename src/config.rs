//! Allocator policy values.

use crate::{
  align::ALIGNMENT,
  block::{HEADER_SIZE, MIN_SPLIT_SURPLUS},
  error::AllocError,
};

/// Tunable policy for an [`ArenaAllocator`](crate::ArenaAllocator).
///
/// Alignment, header size and the minimum split surplus are fixed at compile
/// time. The zero-allocate threshold is not configured here: it is the page
/// size reported by the memory source at the time of each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Requests whose aligned size plus a header reach this many bytes bypass
  /// the heap and get their own mapping.
  ///
  /// Also the size of the one-time heap preallocation, unless the first
  /// request is a zero-allocate larger than this (possible when the page
  /// size exceeds the threshold), which preallocates its own extent.
  /// Default: 131072 (128 KiB).
  pub mmap_threshold: usize,
}

impl ArenaConfig {
  /// Default large-object threshold.
  pub const DEFAULT_MMAP_THRESHOLD: usize = 128 * 1024;

  /// The default policy, usable in `const` and `static` initializers.
  pub const DEFAULT: Self = Self::new(Self::DEFAULT_MMAP_THRESHOLD);

  /// Create a config with the given large-object threshold.
  pub const fn new(
    mmap_threshold: usize,
  ) -> Self {
    Self { mmap_threshold }
  }

  /// Checks that the preallocated block can hold a header and at least one
  /// split-sized remainder.
  pub fn validate(&self) -> Result<(), AllocError> {
    if self.mmap_threshold % ALIGNMENT != 0 {
      return Err(AllocError::InvalidConfig {
        reason: "mmap threshold must be a multiple of the alignment unit",
      });
    }

    if self.mmap_threshold < HEADER_SIZE + MIN_SPLIT_SURPLUS {
      return Err(AllocError::InvalidConfig {
        reason: "mmap threshold too small to hold a split block",
      });
    }

    Ok(())
  }
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
