//! Installing the arena as a Rust program's global allocator.

use std::{
  alloc::{GlobalAlloc, Layout},
  cell::UnsafeCell,
  ptr::{self, NonNull},
};

use crate::{align::ALIGNMENT, arena::ArenaAllocator, source::SystemMemory};

/// An [`ArenaAllocator`] over the real program break, usable as
/// `#[global_allocator]`.
///
/// ```rust,ignore
/// use brkalloc::GlobalArena;
///
/// #[global_allocator]
/// static GLOBAL: GlobalArena = GlobalArena::new();
/// ```
///
/// # Safety
///
/// There is no locking. The program must allocate from one thread only, and
/// any installed `log` backend must not allocate, since log calls are made
/// while the arena is borrowed. Layouts aligned beyond
/// [`ALIGNMENT`](crate::ALIGNMENT) are refused with a null pointer.
pub struct GlobalArena {
  arena: UnsafeCell<ArenaAllocator<SystemMemory>>,
}

// Single-threaded use is a documented precondition of this type.
unsafe impl Sync for GlobalArena {}

impl GlobalArena {
  pub const fn new() -> Self {
    Self {
      arena: UnsafeCell::new(ArenaAllocator::new(SystemMemory::new())),
    }
  }

  /// Runs `f` with exclusive access to the arena.
  ///
  /// # Safety
  ///
  /// No other access to the arena, including allocation through the global
  /// allocator, may happen while `f` runs. Copy what you need out of `f`
  /// before formatting or printing it.
  pub unsafe fn with<R>(
    &self,
    f: impl FnOnce(&mut ArenaAllocator<SystemMemory>) -> R,
  ) -> R {
    f(unsafe { &mut *self.arena.get() })
  }
}

impl Default for GlobalArena {
  fn default() -> Self {
    Self::new()
  }
}

fn into_raw(
  ptr: Option<NonNull<u8>>,
) -> *mut u8 {
  ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
}

unsafe impl GlobalAlloc for GlobalArena {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    into_raw(unsafe { self.with(|arena| arena.allocate(layout.size())) })
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    into_raw(unsafe { self.with(|arena| arena.zero_allocate(1, layout.size())) })
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.with(|arena| arena.release(NonNull::new(ptr))) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    into_raw(unsafe { self.with(|arena| arena.resize(NonNull::new(ptr), new_size)) })
  }
}
