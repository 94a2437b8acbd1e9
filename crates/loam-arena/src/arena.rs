//! The native memory arena.

use std::alloc::Layout;
use std::any::type_name;
use std::ffi::c_char;
use std::mem::{align_of, size_of};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytemuck::{AnyBitPattern, NoUninit, Pod};
use indexmap::IndexMap;

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::handle::{HandleOrigin, NativeHandle};
use crate::raw;

/// Bookkeeping for one live block.
#[derive(Clone, Copy, Debug)]
struct Allocation {
    layout: Layout,
    /// Bytes the caller asked for (the layout is at least one byte).
    len: usize,
    generation: u32,
}

#[derive(Debug, Default)]
struct ArenaState {
    live: IndexMap<usize, Allocation>,
    live_bytes: usize,
    total_allocations: u64,
    next_generation: u32,
}

/// Allocator for native memory blocks handed to (or read from) the native
/// library.
///
/// All methods take `&self`; the allocation table sits behind a mutex, and
/// reads and writes hold it for their duration so a block cannot be freed
/// mid-copy by another thread.
///
/// Dropping the arena frees anything still live. That is a safety net for
/// error paths, not the normal release route.
#[derive(Debug)]
pub struct NativeArena {
    config: ArenaConfig,
    state: Mutex<ArenaState>,
}

impl NativeArena {
    /// Create an arena with the given configuration.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(ArenaState::default()),
        })
    }

    /// Create an arena with [`ArenaConfig::default`].
    pub fn with_defaults() -> Self {
        Self {
            config: ArenaConfig::default(),
            state: Mutex::new(ArenaState::default()),
        }
    }

    /// The arena's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        // Table updates are single inserts/removes; a panic elsewhere while
        // holding the guard cannot leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate `byte_size` zeroed bytes.
    ///
    /// A zero-byte request still returns a real, non-null block so empty
    /// native arrays are distinguishable from absent ones.
    pub fn allocate(&self, byte_size: usize) -> Result<NativeHandle, ArenaError> {
        self.allocate_aligned(byte_size, self.config.alignment)
    }

    fn allocate_aligned(&self, byte_size: usize, align: usize) -> Result<NativeHandle, ArenaError> {
        let align = align.max(self.config.alignment);
        let layout = Layout::from_size_align(byte_size.max(1), align).map_err(|_| {
            ArenaError::InvalidLayout {
                type_name: "allocation".into(),
                expected: isize::MAX as usize,
                actual: byte_size,
            }
        })?;

        let mut state = self.lock();
        if let Some(max) = self.config.max_bytes {
            let left = max.saturating_sub(state.live_bytes);
            if layout.size() > left {
                return Err(ArenaError::OutOfMemory {
                    requested: byte_size,
                    capacity: Some(left),
                });
            }
        }

        let ptr = raw::alloc_zeroed(layout).ok_or(ArenaError::OutOfMemory {
            requested: byte_size,
            capacity: None,
        })?;
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);
        let handle = NativeHandle::new(ptr.as_ptr(), byte_size, generation);
        state.live.insert(
            handle.address(),
            Allocation {
                layout,
                len: byte_size,
                generation,
            },
        );
        state.live_bytes += layout.size();
        state.total_allocations += 1;
        log::trace!("arena alloc {handle:?}");
        Ok(handle)
    }

    /// Free the block behind `handle` and null the handle.
    ///
    /// Null, already-freed, stale, and foreign handles are no-ops (the
    /// handle is still nulled).
    pub fn free(&self, handle: &mut NativeHandle) {
        let h = std::mem::take(handle);
        if h.is_null() {
            return;
        }
        if h.origin() == HandleOrigin::Foreign {
            log::trace!("arena free skipped for foreign {h:?}");
            return;
        }
        let mut state = self.lock();
        let owned = state
            .live
            .get(&h.address())
            .is_some_and(|a| a.generation == h.generation());
        if owned {
            Self::release(&mut state, h.address());
        } else {
            log::trace!("arena free no-op for {h:?}");
        }
    }

    /// Free a block by address, as found inside a native struct.
    ///
    /// Returns whether anything was freed. Null and unknown addresses are
    /// no-ops, which is what keeps memory owned by the native library out
    /// of this arena's reach.
    pub fn free_address<T>(&self, ptr: *mut T) -> bool {
        if ptr.is_null() {
            return false;
        }
        let addr = ptr.cast::<u8>().expose_provenance();
        let mut state = self.lock();
        if state.live.contains_key(&addr) {
            Self::release(&mut state, addr);
            true
        } else {
            log::trace!("arena free no-op for unowned address {addr:#x}");
            false
        }
    }

    #[allow(unsafe_code)]
    fn release(state: &mut ArenaState, addr: usize) {
        if let Some(a) = state.live.swap_remove(&addr) {
            state.live_bytes -= a.layout.size();
            // SAFETY: the address came from `alloc_zeroed` with this layout
            // and was just removed from the table, so it is freed once.
            unsafe {
                raw::dealloc(std::ptr::with_exposed_provenance_mut(addr), a.layout)
            };
        }
    }

    /// Whether `handle` names a live block of this arena.
    pub fn is_live(&self, handle: &NativeHandle) -> bool {
        self.lock()
            .live
            .get(&handle.address())
            .is_some_and(|a| a.generation == handle.generation() && handle.is_arena_owned())
    }

    /// Whether `ptr` is the base address of a live block of this arena.
    pub fn owns<T>(&self, ptr: *const T) -> bool {
        let addr = ptr.cast::<u8>().expose_provenance();
        self.lock().live.contains_key(&addr)
    }

    /// Look up the live handle for a base address, if this arena owns it.
    pub fn handle_for<T>(&self, ptr: *const T) -> Option<NativeHandle> {
        let addr = ptr.cast::<u8>().expose_provenance();
        let state = self.lock();
        state.live.get(&addr).map(|a| NativeHandle {
            addr,
            len: a.len,
            generation: a.generation,
            origin: HandleOrigin::Arena,
        })
    }

    /// Check liveness and range, returning the lock so the caller can copy
    /// while the block is pinned.
    fn checked(
        &self,
        handle: &NativeHandle,
        offset: usize,
        len: usize,
    ) -> Result<MutexGuard<'_, ArenaState>, ArenaError> {
        let state = self.lock();
        if handle.is_null() {
            return Err(ArenaError::StaleHandle {
                address: 0,
                generation: handle.generation(),
            });
        }
        if handle.origin() == HandleOrigin::Arena {
            let live = state
                .live
                .get(&handle.address())
                .is_some_and(|a| a.generation == handle.generation());
            if !live {
                return Err(ArenaError::StaleHandle {
                    address: handle.address(),
                    generation: handle.generation(),
                });
            }
        }
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > handle.len() {
            return Err(ArenaError::InvalidLayout {
                type_name: "byte range".into(),
                expected: handle.len(),
                actual: end,
            });
        }
        Ok(state)
    }

    /// Copy `bytes` into the block at `offset`.
    #[allow(unsafe_code)]
    pub fn copy_in(
        &self,
        handle: &NativeHandle,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), ArenaError> {
        let _pin = self.checked(handle, offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        // SAFETY: `checked` confirmed the block is live (or a foreign block
        // vouched for by `from_raw`) and `offset + len` is within it.
        unsafe {
            raw::copy_in(handle.as_ptr().add(offset), bytes)
        };
        Ok(())
    }

    /// Copy `len` bytes out of the block starting at `offset`.
    #[allow(unsafe_code)]
    pub fn copy_out(
        &self,
        handle: &NativeHandle,
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, ArenaError> {
        let _pin = self.checked(handle, offset, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: as in `copy_in`.
        let bytes = unsafe { raw::copy_out(handle.as_ptr().add(offset), len) };
        Ok(bytes)
    }

    /// Write a blittable array at the start of the block.
    ///
    /// `element_size` is the native per-element size from the type's
    /// descriptor; it must equal `size_of::<T>()`.
    pub fn write_array<T: Pod>(
        &self,
        handle: &NativeHandle,
        data: &[T],
        element_size: usize,
    ) -> Result<(), ArenaError> {
        check_element_size::<T>(element_size)?;
        self.copy_in(handle, 0, bytemuck::cast_slice(data))
    }

    /// Read `count` blittable elements from the start of the block.
    pub fn read_array<T: Pod>(
        &self,
        handle: &NativeHandle,
        count: usize,
        element_size: usize,
    ) -> Result<Vec<T>, ArenaError> {
        check_element_size::<T>(element_size)?;
        let len = count.checked_mul(element_size).ok_or(ArenaError::InvalidLayout {
            type_name: type_name::<T>().into(),
            expected: handle.len(),
            actual: usize::MAX,
        })?;
        let bytes = self.copy_out(handle, 0, len)?;
        Ok(bytes
            .chunks_exact(element_size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Allocate a block holding `value`.
    ///
    /// For inline native structs that carry pointers and therefore cannot
    /// be `Pod`.
    pub fn alloc_struct<T: Copy>(&self, value: T) -> Result<NativeHandle, ArenaError> {
        let handle = self.allocate_aligned(size_of::<T>(), align_of::<T>())?;
        self.write_struct(&handle, 0, value)?;
        Ok(handle)
    }

    /// Store `value` as element `index` of a block of `T`s.
    #[allow(unsafe_code)]
    pub fn write_struct<T: Copy>(
        &self,
        handle: &NativeHandle,
        index: usize,
        value: T,
    ) -> Result<(), ArenaError> {
        let offset = struct_offset::<T>(index)?;
        let _pin = self.checked(handle, offset, size_of::<T>())?;
        if size_of::<T>() == 0 {
            return Ok(());
        }
        // SAFETY: in range per `checked`; arena blocks are aligned to at
        // least `align_of::<T>()` and `offset` is a multiple of
        // `size_of::<T>()`, itself a multiple of the alignment.
        unsafe {
            raw::write_value(handle.as_ptr().add(offset), value)
        };
        Ok(())
    }

    /// Load element `index` of a block of `T`s.
    #[allow(unsafe_code)]
    pub fn read_struct<T: AnyBitPattern>(
        &self,
        handle: &NativeHandle,
        index: usize,
    ) -> Result<T, ArenaError> {
        let offset = struct_offset::<T>(index)?;
        let _pin = self.checked(handle, offset, size_of::<T>())?;
        // SAFETY: in range and aligned as in `write_struct`; the bytes are
        // initialised (blocks start zeroed) and any pattern is a valid `T`.
        let value = unsafe { raw::read_value(handle.as_ptr().add(offset)) };
        Ok(value)
    }

    /// Allocate a block holding a contiguous copy of `items`.
    ///
    /// `T` has no padding, so every byte of the block stays initialised
    /// for [`NativeArena::copy_out`].
    pub fn alloc_array<T: NoUninit>(&self, items: &[T]) -> Result<NativeHandle, ArenaError> {
        let bytes: &[u8] = bytemuck::cast_slice(items);
        let handle = self.allocate_aligned(bytes.len(), align_of::<T>())?;
        self.copy_in(&handle, 0, bytes)?;
        Ok(handle)
    }

    /// Allocate a NUL-terminated copy of `s`.
    pub fn alloc_c_string(&self, s: &str) -> Result<NativeHandle, ArenaError> {
        if let Some(position) = s.bytes().position(|b| b == 0) {
            return Err(ArenaError::InteriorNul { position });
        }
        let handle = self.allocate(s.len() + 1)?;
        // The block is zeroed, so the terminator is already in place.
        self.copy_in(&handle, 0, s.as_bytes())?;
        Ok(handle)
    }

    /// Pointer to a C string in `handle`, for storing into native structs.
    pub fn c_str_ptr(handle: &NativeHandle) -> *const c_char {
        handle.as_ptr().cast_const().cast()
    }

    /// Number of live blocks.
    pub fn live_allocations(&self) -> usize {
        self.lock().live.len()
    }

    /// Bytes held by live blocks (after rounding zero-byte requests up).
    pub fn live_bytes(&self) -> usize {
        self.lock().live_bytes
    }

    /// Blocks allocated over the arena's lifetime.
    pub fn total_allocations(&self) -> u64 {
        self.lock().total_allocations
    }

    /// Free every live block. Returns how many were freed.
    ///
    /// Used to discard a partially built structure after a failed export,
    /// where walking the half-written graph is not safe.
    pub fn free_all(&self) -> usize {
        let mut state = self.lock();
        let addrs: Vec<usize> = state.live.keys().copied().collect();
        for &addr in &addrs {
            Self::release(&mut state, addr);
        }
        if !addrs.is_empty() {
            log::debug!("arena freed {} outstanding blocks", addrs.len());
        }
        addrs.len()
    }
}

impl Default for NativeArena {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Drop for NativeArena {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.live.is_empty() {
            return;
        }
        log::warn!(
            "native arena dropped with {} live allocations ({} bytes); freeing",
            state.live.len(),
            state.live_bytes
        );
        let addrs: Vec<usize> = state.live.keys().copied().collect();
        for addr in addrs {
            Self::release(state, addr);
        }
    }
}

fn check_element_size<T>(element_size: usize) -> Result<(), ArenaError> {
    if element_size != size_of::<T>() {
        return Err(ArenaError::InvalidLayout {
            type_name: type_name::<T>().into(),
            expected: element_size,
            actual: size_of::<T>(),
        });
    }
    Ok(())
}

fn struct_offset<T>(index: usize) -> Result<usize, ArenaError> {
    index
        .checked_mul(size_of::<T>())
        .ok_or(ArenaError::InvalidLayout {
            type_name: type_name::<T>().into(),
            expected: isize::MAX as usize,
            actual: usize::MAX,
        })
}
