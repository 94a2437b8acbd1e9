//! Node contract.
//!
//! The native tree links both ways: each child's `parent` points at the
//! struct that owns it. Children are allocated one block each so that the
//! parent address is known before the child is written.

use std::mem::size_of;
use std::ptr;

use loam_arena::NativeArena;
use loam_core::{InteropError, Node};

use crate::marshal::{
    alloc_values, array_bytes, free_pointer_array, native_count, read_pointer_array, read_values,
    Marshal,
};
use crate::types::{AiNode, AiString};

impl Marshal for Node {
    type Native = AiNode;

    fn to_native(&self, arena: &NativeArena, this: *mut AiNode) -> Result<AiNode, InteropError> {
        let bytes = array_bytes(size_of::<*mut AiNode>(), self.children.len(), "node children")?;
        let children = arena.allocate(bytes)?;
        for (i, child) in self.children.iter().enumerate() {
            let block = arena.allocate(size_of::<AiNode>())?;
            let child_ptr = block.cast::<AiNode>();
            let mut native = child.to_native(arena, child_ptr)?;
            native.parent = this;
            arena.write_struct(&block, 0, native)?;
            arena.write_struct(&children, i, child_ptr)?;
        }

        let meshes = self
            .mesh_indices
            .iter()
            .map(|&m| {
                u32::try_from(m).map_err(|_| InteropError::marshal("mesh index exceeds u32"))
            })
            .collect::<Result<Vec<u32>, _>>()?;

        Ok(AiNode {
            name: AiString::new(&self.name)?,
            transformation: self.transform.into(),
            parent: ptr::null_mut(),
            num_children: native_count(self.children.len(), "node children")?,
            children: children.cast(),
            num_meshes: native_count(meshes.len(), "node meshes")?,
            meshes: alloc_values(arena, &meshes)?,
            meta_data: ptr::null_mut(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiNode) -> Result<Self, InteropError> {
        // SAFETY: `meshes` is valid for `num_meshes` per the contract.
        let mesh_indices: Vec<u32> =
            unsafe { read_values(native.meshes, native.num_meshes as usize, "node meshes")? };
        // SAFETY: `children` is valid for `num_children`, each a valid node.
        let children = unsafe {
            read_pointer_array::<Node>(
                native.children,
                native.num_children as usize,
                "node children",
            )?
        };
        Ok(Node {
            name: native.name.to_string_lossy()?,
            transform: native.transformation.into(),
            children,
            mesh_indices: mesh_indices.into_iter().map(|m| m as usize).collect(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiNode, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let node = unsafe { *native };
        // SAFETY: `children` is valid for `num_children` per the contract.
        unsafe {
            free_pointer_array::<Node>(arena, node.children, node.num_children as usize);
        }
        arena.free_address(node.meshes);
        if free_self {
            arena.free_address(native);
        }
    }
}
