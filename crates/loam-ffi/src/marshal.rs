//! The per-entity marshaling contract and shared array helpers.
//!
//! Three array shapes occur in the native scene:
//!
//! - contiguous inline structs (`aiFace*` in a mesh),
//! - arrays of pointers to individually allocated structs (`aiMesh**`),
//! - contiguous blittable values (`aiVector3D*`), copied as bytes.
//!
//! Required arrays are always non-null, even when empty; optional
//! per-vertex streams are null when absent because the native library
//! treats a non-null stream as present.

use std::mem::size_of;
use std::ptr;
use std::slice;

use bytemuck::{NoUninit, Pod};
use loam_arena::{describe, NativeArena, NativeLayout};
use loam_core::InteropError;

/// Bidirectional conversion between a managed entity and its native struct.
pub trait Marshal: Sized {
    /// The native struct this entity maps onto.
    type Native: NativeLayout;

    /// Build the native struct, allocating nested memory in `arena`.
    ///
    /// `this` is the address the returned value will be stored at, or null
    /// when it is stored inline in a parent's array. Entities that link
    /// back to their parent (nodes) need it.
    fn to_native(
        &self,
        arena: &NativeArena,
        this: *mut Self::Native,
    ) -> Result<Self::Native, InteropError>;

    /// Build an independent managed copy. Never retains native pointers.
    ///
    /// # Safety
    ///
    /// Every pointer reachable from `native` must be valid for the counts
    /// it declares.
    #[allow(unsafe_code)]
    unsafe fn from_native(native: &Self::Native) -> Result<Self, InteropError>;

    /// Release nested allocations, and `native` itself when `free_self`.
    ///
    /// Pointers the arena does not own are left alone, so calling this on
    /// library-owned memory is harmless. Pass `free_self = false` for
    /// inline elements and for structs the caller frees separately.
    ///
    /// # Safety
    ///
    /// `native` must be null or point to a valid `Self::Native` whose
    /// nested pointers are valid or null.
    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut Self::Native, free_self: bool);
}

/// Convert a length to the native `u32` count.
pub(crate) fn native_count(len: usize, what: &str) -> Result<u32, InteropError> {
    u32::try_from(len)
        .map_err(|_| InteropError::marshal(format!("{what}: {len} elements exceed u32")))
}

/// Byte size of `count` elements of `element_size` bytes each.
pub(crate) fn array_bytes(
    element_size: usize,
    count: usize,
    what: &str,
) -> Result<usize, InteropError> {
    element_size
        .checked_mul(count)
        .ok_or_else(|| InteropError::marshal(format!("{what}: {count} elements overflow usize")))
}

/// Allocate a contiguous array of inline native structs.
pub fn alloc_inline_array<T: Marshal>(
    arena: &NativeArena,
    items: &[T],
) -> Result<*mut T::Native, InteropError> {
    let bytes = array_bytes(size_of::<T::Native>(), items.len(), "inline array")?;
    let block = arena.allocate(bytes)?;
    for (i, item) in items.iter().enumerate() {
        let native = item.to_native(arena, ptr::null_mut())?;
        arena.write_struct(&block, i, native)?;
    }
    Ok(block.cast())
}

/// Allocate one native struct for `item`, passing its own address as
/// `this`.
pub fn alloc_boxed<T: Marshal>(
    arena: &NativeArena,
    item: &T,
) -> Result<*mut T::Native, InteropError> {
    let block = arena.allocate(size_of::<T::Native>())?;
    let this = block.cast::<T::Native>();
    let native = item.to_native(arena, this)?;
    arena.write_struct(&block, 0, native)?;
    Ok(this)
}

/// Allocate an array of pointers, each to an individually allocated struct.
pub fn alloc_pointer_array<T: Marshal>(
    arena: &NativeArena,
    items: &[T],
) -> Result<*mut *mut T::Native, InteropError> {
    let bytes = array_bytes(size_of::<*mut T::Native>(), items.len(), "pointer array")?;
    let block = arena.allocate(bytes)?;
    for (i, item) in items.iter().enumerate() {
        let element = alloc_boxed(arena, item)?;
        arena.write_struct(&block, i, element)?;
    }
    Ok(block.cast())
}

/// Allocate a blittable array, converting each element and checking the
/// element size against the type's descriptor.
pub fn alloc_blittable<T, N>(arena: &NativeArena, items: &[T]) -> Result<*mut N, InteropError>
where
    T: Copy + Into<N>,
    N: NativeLayout + Pod,
{
    let layout = describe::<N>()?;
    let natives: Vec<N> = items.iter().map(|&v| v.into()).collect();
    let bytes = array_bytes(layout.size, natives.len(), layout.name)?;
    let block = arena.allocate(bytes)?;
    arena.write_array(&block, &natives, layout.size)?;
    Ok(block.cast())
}

/// Like [`alloc_blittable`], but an empty input yields null. For optional
/// per-vertex streams.
pub fn alloc_optional_blittable<T, N>(
    arena: &NativeArena,
    items: &[T],
) -> Result<*mut N, InteropError>
where
    T: Copy + Into<N>,
    N: NativeLayout + Pod,
{
    if items.is_empty() {
        return Ok(ptr::null_mut());
    }
    alloc_blittable(arena, items)
}

/// Allocate a plain copy of `items` (indices, raw bytes).
pub fn alloc_values<T: NoUninit>(
    arena: &NativeArena,
    items: &[T],
) -> Result<*mut T, InteropError> {
    Ok(arena.alloc_array(items)?.cast())
}

/// Borrow a native array as a slice, rejecting null with a non-zero count.
///
/// # Safety
///
/// When non-null, `ptr` must be valid for `count` reads of `T`.
#[allow(unsafe_code)]
pub unsafe fn native_slice<'a, T>(
    ptr: *const T,
    count: usize,
    what: &str,
) -> Result<&'a [T], InteropError> {
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(InteropError::marshal(format!(
            "{what}: null pointer with {count} declared elements"
        )));
    }
    // SAFETY: non-null and valid for `count` elements per the caller.
    Ok(unsafe { slice::from_raw_parts(ptr, count) })
}

/// Copy a native array of plain values.
///
/// # Safety
///
/// As for [`native_slice`].
#[allow(unsafe_code)]
pub unsafe fn read_values<T: Copy, U: From<T>>(
    ptr: *const T,
    count: usize,
    what: &str,
) -> Result<Vec<U>, InteropError> {
    // SAFETY: forwarded to the caller.
    let items = unsafe { native_slice(ptr, count, what)? };
    Ok(items.iter().map(|&v| U::from(v)).collect())
}

/// Copy an optional per-vertex stream: null means absent.
///
/// # Safety
///
/// As for [`native_slice`].
#[allow(unsafe_code)]
pub unsafe fn read_optional_values<T: Copy, U: From<T>>(
    ptr: *const T,
    count: usize,
) -> Vec<U> {
    if ptr.is_null() || count == 0 {
        return Vec::new();
    }
    // SAFETY: non-null and valid for `count` elements per the caller.
    let items = unsafe { slice::from_raw_parts(ptr, count) };
    items.iter().map(|&v| U::from(v)).collect()
}

/// Convert a contiguous array of inline native structs.
///
/// # Safety
///
/// As for [`native_slice`], plus [`Marshal::from_native`] for each element.
#[allow(unsafe_code)]
pub unsafe fn read_inline_array<T: Marshal>(
    ptr: *const T::Native,
    count: usize,
    what: &str,
) -> Result<Vec<T>, InteropError> {
    // SAFETY: forwarded to the caller.
    let natives = unsafe { native_slice(ptr, count, what)? };
    natives
        .iter()
        // SAFETY: each element is valid per the caller.
        .map(|n| unsafe { T::from_native(n) })
        .collect()
}

/// Convert an array of pointers to native structs. Null elements fail.
///
/// # Safety
///
/// As for [`read_inline_array`], for each pointed-to struct.
#[allow(unsafe_code)]
pub unsafe fn read_pointer_array<T: Marshal>(
    ptr: *const *mut T::Native,
    count: usize,
    what: &str,
) -> Result<Vec<T>, InteropError> {
    // SAFETY: forwarded to the caller.
    let pointers = unsafe { native_slice(ptr, count, what)? };
    pointers
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if p.is_null() {
                return Err(InteropError::marshal(format!("{what}: element {i} is null")));
            }
            // SAFETY: non-null and valid per the caller.
            unsafe { T::from_native(&*p) }
        })
        .collect()
}

/// Release an inline array and its elements' nested allocations.
///
/// # Safety
///
/// `ptr` must be null or valid for `count` elements.
#[allow(unsafe_code)]
pub unsafe fn free_inline_array<T: Marshal>(
    arena: &NativeArena,
    ptr: *mut T::Native,
    count: usize,
) {
    if ptr.is_null() {
        return;
    }
    for i in 0..count {
        // SAFETY: in bounds per the caller.
        unsafe { T::free_native(arena, ptr.add(i), false) };
    }
    arena.free_address(ptr);
}

/// Release a pointer array and every struct it points to.
///
/// # Safety
///
/// `ptr` must be null or valid for `count` pointers, each null or valid.
#[allow(unsafe_code)]
pub unsafe fn free_pointer_array<T: Marshal>(
    arena: &NativeArena,
    ptr: *mut *mut T::Native,
    count: usize,
) {
    if ptr.is_null() {
        return;
    }
    for i in 0..count {
        // SAFETY: in bounds per the caller.
        let element = unsafe { *ptr.add(i) };
        // SAFETY: element is null or valid per the caller.
        unsafe { T::free_native(arena, element, true) };
    }
    arena.free_address(ptr);
}
