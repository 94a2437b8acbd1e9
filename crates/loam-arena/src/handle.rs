//! Native memory handles.
//!
//! A [`NativeHandle`] names a block of native memory: its address, its byte
//! length, the arena generation it was allocated in, and who owns it. The
//! generation lets the arena reject a handle whose block was freed and whose
//! address was later reused by an unrelated allocation.

use std::fmt;

/// Who owns the memory behind a [`NativeHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleOrigin {
    /// Allocated by a [`NativeArena`](crate::NativeArena); freed through it.
    Arena,
    /// Owned by someone else. The arena reads and writes it on request but
    /// never frees it.
    Foreign,
}

/// Address, length, generation, and origin of a native block.
///
/// Handles are plain values. Copying one does not copy the memory, and
/// dropping one does not free it; [`NativeArena::free`](crate::NativeArena::free)
/// takes `&mut NativeHandle` and nulls it so a second free is a no-op.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct NativeHandle {
    pub(crate) addr: usize,
    pub(crate) len: usize,
    pub(crate) generation: u32,
    pub(crate) origin: HandleOrigin,
}

impl NativeHandle {
    /// The null handle. Freeing it is a no-op; reading or writing it fails.
    pub const NULL: Self = Self {
        addr: 0,
        len: 0,
        generation: 0,
        origin: HandleOrigin::Arena,
    };

    pub(crate) fn new(ptr: *mut u8, len: usize, generation: u32) -> Self {
        Self {
            addr: ptr.expose_provenance(),
            len,
            generation,
            origin: HandleOrigin::Arena,
        }
    }

    /// Wrap memory the arena does not own.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads (and for writes, if the handle is
    /// written through) of `len` bytes for as long as the handle is used,
    /// and suitably aligned for whatever is read from it.
    #[allow(unsafe_code)]
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self {
            addr: ptr.expose_provenance(),
            len,
            generation: 0,
            origin: HandleOrigin::Foreign,
        }
    }

    /// Base address as a raw pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        std::ptr::with_exposed_provenance_mut(self.addr)
    }

    /// Base address cast to `*mut T`.
    pub fn cast<T>(&self) -> *mut T {
        self.as_ptr().cast()
    }

    /// Base address as an integer.
    pub fn address(&self) -> usize {
        self.addr
    }

    /// Length of the block in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is zero bytes long. A zero-length arena block is
    /// still a real, non-null allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this is the null handle.
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Arena generation of the allocation (0 for foreign handles).
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Owner of the memory.
    pub fn origin(&self) -> HandleOrigin {
        self.origin
    }

    /// Whether the arena owns this block.
    pub fn is_arena_owned(&self) -> bool {
        self.origin == HandleOrigin::Arena && !self.is_null()
    }
}

impl Default for NativeHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NativeHandle(addr={:#x}, len={}, gen={}, {:?})",
            self.addr, self.len, self.generation, self.origin
        )
    }
}
