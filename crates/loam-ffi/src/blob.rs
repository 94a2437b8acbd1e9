//! Export blob chain contract.
//!
//! Chains are walked iteratively in every direction so a long chain cannot
//! exhaust the stack.

use std::ptr;

use loam_arena::NativeArena;
use loam_core::{ExportDataBlob, InteropError};

use crate::marshal::{alloc_values, read_values, Marshal};
use crate::types::{AiExportDataBlob, AiString};

fn blob_node(
    arena: &NativeArena,
    blob: &ExportDataBlob,
    next: *mut AiExportDataBlob,
) -> Result<AiExportDataBlob, InteropError> {
    Ok(AiExportDataBlob {
        size: blob.data.len(),
        data: alloc_values(arena, &blob.data)?.cast(),
        name: AiString::new(&blob.name)?,
        next,
    })
}

#[allow(unsafe_code)]
unsafe fn read_blob(native: &AiExportDataBlob) -> Result<ExportDataBlob, InteropError> {
    // SAFETY: `data` is valid for `size` bytes per the contract.
    let data: Vec<u8> = unsafe { read_values(native.data.cast::<u8>(), native.size, "blob data")? };
    Ok(ExportDataBlob::new(native.name.to_string_lossy()?, data))
}

impl Marshal for ExportDataBlob {
    type Native = AiExportDataBlob;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiExportDataBlob,
    ) -> Result<AiExportDataBlob, InteropError> {
        let successors: Vec<&ExportDataBlob> = self.iter().skip(1).collect();
        let mut next = ptr::null_mut();
        for blob in successors.into_iter().rev() {
            let native = blob_node(arena, blob, next)?;
            next = arena.alloc_struct(native)?.cast();
        }
        blob_node(arena, self, next)
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiExportDataBlob) -> Result<Self, InteropError> {
        // SAFETY: `native` is valid per the caller.
        let mut blobs = vec![unsafe { read_blob(native)? }];
        let mut cursor = native.next;
        while !cursor.is_null() {
            // SAFETY: each `next` is null or valid per the contract.
            let current = unsafe { &*cursor };
            // SAFETY: as above.
            blobs.push(unsafe { read_blob(current)? });
            cursor = current.next;
        }
        Self::from_chain(blobs).ok_or_else(|| InteropError::marshal("empty blob chain"))
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiExportDataBlob, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let head = unsafe { *native };
        arena.free_address(head.data);
        let mut cursor = head.next;
        while !cursor.is_null() {
            // SAFETY: each `next` is null or valid per the contract.
            let current = unsafe { *cursor };
            arena.free_address(current.data);
            arena.free_address(cursor);
            cursor = current.next;
        }
        if free_self {
            arena.free_address(native);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::alloc_boxed;

    fn obj_and_mtl() -> ExportDataBlob {
        ExportDataBlob::from_chain(vec![
            ExportDataBlob::new("", b"o tri\nv 0 0 0\n".to_vec()),
            ExportDataBlob::new("mtl", b"newmtl DefaultMaterial\n".to_vec()),
            ExportDataBlob::new("log", Vec::new()),
        ])
        .unwrap()
    }

    #[test]
    #[allow(unsafe_code)]
    fn chain_round_trip_keeps_order() {
        let arena = NativeArena::with_defaults();
        let chain = obj_and_mtl();
        let ptr = alloc_boxed(&arena, &chain).unwrap();
        // SAFETY: `ptr` was just written by `alloc_boxed`.
        unsafe {
            assert_eq!((*ptr).size, 14);
            assert!(!(*ptr).next.is_null());
            let back = ExportDataBlob::from_native(&*ptr).unwrap();
            assert_eq!(back, chain);
            assert_eq!(back.chain_len(), 3);
            ExportDataBlob::free_native(&arena, ptr, true);
        }
        assert_eq!(arena.live_allocations(), 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn long_chain_is_walked_iteratively() {
        let arena = NativeArena::with_defaults();
        let blobs = (0..1_000)
            .map(|i| ExportDataBlob::new(format!("b{i}"), vec![i as u8]))
            .collect();
        let chain = ExportDataBlob::from_chain(blobs).unwrap();
        let ptr = alloc_boxed(&arena, &chain).unwrap();
        // SAFETY: `ptr` was just written by `alloc_boxed`.
        let back = unsafe { ExportDataBlob::from_native(&*ptr) }.unwrap();
        assert_eq!(back.chain_len(), 1_000);
        assert_eq!(back.find("b999").map(|b| b.data.clone()), Some(vec![231]));
        // SAFETY: as above.
        unsafe { ExportDataBlob::free_native(&arena, ptr, true) };
        assert_eq!(arena.live_allocations(), 0);
    }
}
