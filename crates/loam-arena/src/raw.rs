//! Low-level primitives for arena memory operations.
//!
//! Every function here touches raw memory. Callers in `arena.rs` establish
//! the preconditions (block is live, range is in bounds) under the arena
//! lock before calling in.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

/// Allocate a zeroed block. Returns `None` when the allocator fails.
pub(crate) fn alloc_zeroed(layout: Layout) -> Option<NonNull<u8>> {
    debug_assert!(layout.size() > 0);
    // SAFETY: the arena never builds a zero-sized layout; zero-byte requests
    // are rounded up to one byte before reaching here.
    NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
}

/// Return a block to the system allocator.
///
/// # Safety
///
/// `ptr` must have come from [`alloc_zeroed`] with the same `layout`, and
/// must not be freed again.
pub(crate) unsafe fn dealloc(ptr: *mut u8, layout: Layout) {
    // SAFETY: forwarded to the caller.
    unsafe { alloc::dealloc(ptr, layout) }
}

/// Copy `src` to `dst`.
///
/// # Safety
///
/// `dst` must be valid for writes of `src.len()` bytes and must not overlap
/// `src`.
pub(crate) unsafe fn copy_in(dst: *mut u8, src: &[u8]) {
    // SAFETY: forwarded to the caller.
    unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) }
}

/// Copy `len` bytes out of `src`.
///
/// # Safety
///
/// `src` must be valid for reads of `len` bytes.
pub(crate) unsafe fn copy_out(src: *const u8, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    // SAFETY: `out` is a fresh buffer of `len` bytes; `src` is valid for
    // `len` reads per the caller.
    unsafe { ptr::copy_nonoverlapping(src, out.as_mut_ptr(), len) };
    out
}

/// Store `value` at `dst`.
///
/// # Safety
///
/// `dst` must be valid for writes of `size_of::<T>()` bytes and aligned
/// for `T`.
pub(crate) unsafe fn write_value<T: Copy>(dst: *mut u8, value: T) {
    // SAFETY: forwarded to the caller. `T: Copy` so overwriting without
    // dropping the old bytes leaks nothing.
    unsafe { dst.cast::<T>().write(value) }
}

/// Load a `T` from `src`.
///
/// # Safety
///
/// `src` must be valid for reads of `size_of::<T>()` bytes, aligned for
/// `T`, and hold a valid `T`.
pub(crate) unsafe fn read_value<T: Copy>(src: *const u8) -> T {
    // SAFETY: forwarded to the caller.
    unsafe { src.cast::<T>().read() }
}
