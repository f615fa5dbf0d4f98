//! Allocator error types.

use std::error::Error;
use std::fmt;

/// Errors raised inside the allocator.
///
/// The public allocation operations report failure as `None`; these values
/// travel between the internal steps and through [`MemorySource`] impls.
///
/// [`MemorySource`]: crate::MemorySource
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
  /// The program break could not be moved up.
  HeapExhausted {
    /// Bytes requested from the top of the heap.
    requested: usize,
  },
  /// An anonymous mapping could not be created.
  MapFailed {
    /// Length of the requested mapping.
    len: usize,
  },
  /// A request size overflowed once aligned or combined with a header.
  SizeOverflow {
    /// The size as supplied by the caller.
    requested: usize,
  },
  /// A configuration value is unusable.
  InvalidConfig {
    /// Which constraint was violated.
    reason: &'static str,
  },
  /// The block directory failed a consistency check.
  Corrupted {
    /// Header address of the offending block.
    addr: usize,
    /// Which invariant was violated.
    reason: &'static str,
  },
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::HeapExhausted { requested } => {
        write!(f, "heap exhausted: could not extend the break by {requested} bytes")
      }
      Self::MapFailed { len } => write!(f, "mapping of {len} bytes failed"),
      Self::SizeOverflow { requested } => {
        write!(f, "request of {requested} bytes overflows the size type")
      }
      Self::InvalidConfig { reason } => write!(f, "invalid allocator config: {reason}"),
      Self::Corrupted { addr, reason } => {
        write!(f, "block directory corrupted at {addr:#x}: {reason}")
      }
    }
  }
}

impl Error for AllocError {}
