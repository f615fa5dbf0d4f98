/// Alignment unit for every payload and every recorded heap block size.
pub const ALIGNMENT: usize = 8;

/// Rounds the given size up to the allocator's alignment unit.
///
/// The caller guarantees the addition cannot overflow; use [`align_up`] for
/// sizes that come from outside the allocator.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Checked form of [`align!`]. `None` when rounding up would overflow.
pub const fn align_up(
  value: usize,
) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(padded) => Some(padded & !(ALIGNMENT - 1)),
    None => None,
  }
}
