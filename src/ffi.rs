//! C entry points over one process-wide arena.
//!
//! Same contract as [`GlobalArena`]: callers must not enter these functions
//! from more than one thread.

use std::ptr::NonNull;

use libc::c_void;

use crate::global::GlobalArena;

static ARENA: GlobalArena = GlobalArena::new();

fn into_c(
  ptr: Option<NonNull<u8>>,
) -> *mut c_void {
  ptr.map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

/// `malloc`: `size` bytes, or null for zero or on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn os_malloc(
  size: usize,
) -> *mut c_void {
  into_c(unsafe { ARENA.with(|arena| arena.allocate(size)) })
}

/// `calloc`: `nmemb * size` zeroed bytes, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn os_calloc(
  nmemb: usize,
  size: usize,
) -> *mut c_void {
  into_c(unsafe { ARENA.with(|arena| arena.zero_allocate(nmemb, size)) })
}

/// `realloc`: resize in place when possible, otherwise move.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn os_realloc(
  ptr: *mut c_void,
  size: usize,
) -> *mut c_void {
  into_c(unsafe { ARENA.with(|arena| arena.resize(NonNull::new(ptr.cast()), size)) })
}

/// `free`: null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn os_free(
  ptr: *mut c_void,
) {
  unsafe { ARENA.with(|arena| arena.release(NonNull::new(ptr.cast()))) }
}
