//! Mesh, face, and bone contracts.

use std::ptr;

use loam_arena::NativeArena;
use loam_core::limits::{MAX_COLOR_SETS, MAX_FACE_INDICES, MAX_TEXTURE_COORDS};
use loam_core::{Bone, Face, InteropError, Mesh, PrimitiveType};

use crate::marshal::{
    alloc_blittable, alloc_inline_array, alloc_optional_blittable, alloc_pointer_array,
    alloc_values, free_inline_array, free_pointer_array, native_count, read_inline_array,
    read_optional_values, read_pointer_array, read_values, Marshal,
};
use crate::types::{AiBone, AiColor4D, AiFace, AiMesh, AiString, AiVector3D, AiVertexWeight};

impl Marshal for Face {
    type Native = AiFace;

    fn to_native(&self, arena: &NativeArena, _this: *mut AiFace) -> Result<AiFace, InteropError> {
        if self.index_count() > MAX_FACE_INDICES {
            return Err(InteropError::marshal(format!(
                "face has {} indices (max {MAX_FACE_INDICES})",
                self.index_count()
            )));
        }
        Ok(AiFace {
            num_indices: native_count(self.index_count(), "face indices")?,
            indices: alloc_values(arena, &self.indices)?,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiFace) -> Result<Self, InteropError> {
        // SAFETY: `indices` is valid for `num_indices` per the contract.
        let indices: Vec<u32> =
            unsafe { read_values(native.indices, native.num_indices as usize, "face indices")? };
        Ok(Face::new(indices))
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiFace, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let face = unsafe { *native };
        arena.free_address(face.indices);
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for Bone {
    type Native = AiBone;

    fn to_native(&self, arena: &NativeArena, _this: *mut AiBone) -> Result<AiBone, InteropError> {
        Ok(AiBone {
            name: AiString::new(&self.name)?,
            num_weights: native_count(self.weights.len(), "bone weights")?,
            weights: alloc_blittable::<_, AiVertexWeight>(arena, &self.weights)?,
            offset_matrix: self.offset_matrix.into(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiBone) -> Result<Self, InteropError> {
        Ok(Self {
            name: native.name.to_string_lossy()?,
            // SAFETY: `weights` is valid for `num_weights` per the contract.
            weights: unsafe {
                read_values(native.weights, native.num_weights as usize, "bone weights")?
            },
            offset_matrix: native.offset_matrix.into(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiBone, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let bone = unsafe { &*native };
        arena.free_address(bone.weights);
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for Mesh {
    type Native = AiMesh;

    fn to_native(&self, arena: &NativeArena, _this: *mut AiMesh) -> Result<AiMesh, InteropError> {
        // `from_native` reads `num_vertices` entries from every stream.
        self.validate()?;
        let mut colors = [ptr::null_mut::<AiColor4D>(); MAX_COLOR_SETS];
        for (slot, channel) in colors.iter_mut().zip(&self.vertex_color_channels) {
            *slot = alloc_optional_blittable(arena, channel)?;
        }
        let mut texture_coords = [ptr::null_mut::<AiVector3D>(); MAX_TEXTURE_COORDS];
        for (slot, channel) in texture_coords
            .iter_mut()
            .zip(&self.texture_coordinate_channels)
        {
            *slot = alloc_optional_blittable(arena, channel)?;
        }
        let material_index = u32::try_from(self.material_index)
            .map_err(|_| InteropError::marshal("material index exceeds u32"))?;

        Ok(AiMesh {
            primitive_types: self.primitive_types.bits(),
            num_vertices: native_count(self.vertices.len(), "vertices")?,
            num_faces: native_count(self.faces.len(), "faces")?,
            vertices: alloc_blittable(arena, &self.vertices)?,
            normals: alloc_optional_blittable(arena, &self.normals)?,
            tangents: alloc_optional_blittable(arena, &self.tangents)?,
            bitangents: alloc_optional_blittable(arena, &self.bitangents)?,
            colors,
            texture_coords,
            num_uv_components: self.uv_component_count,
            faces: alloc_inline_array(arena, &self.faces)?,
            num_bones: native_count(self.bones.len(), "bones")?,
            bones: alloc_pointer_array(arena, &self.bones)?,
            material_index,
            name: AiString::new(&self.name)?,
            num_anim_meshes: 0,
            anim_meshes: ptr::null_mut(),
            method: 0,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiMesh) -> Result<Self, InteropError> {
        let n = native.num_vertices as usize;
        let mut mesh = Mesh::new(
            native.name.to_string_lossy()?,
            PrimitiveType::from_bits_truncate(native.primitive_types),
        );
        // SAFETY: every stream is valid for `num_vertices` (or null when
        // optional), faces for `num_faces`, bones for `num_bones`, per the
        // contract.
        unsafe {
            mesh.vertices = read_values(native.vertices, n, "mesh vertices")?;
            mesh.normals = read_optional_values(native.normals, n);
            mesh.tangents = read_optional_values(native.tangents, n);
            mesh.bitangents = read_optional_values(native.bitangents, n);
            for (channel, &p) in mesh.vertex_color_channels.iter_mut().zip(&native.colors) {
                *channel = read_optional_values(p, n);
            }
            for (channel, &p) in mesh
                .texture_coordinate_channels
                .iter_mut()
                .zip(&native.texture_coords)
            {
                *channel = read_optional_values(p, n);
            }
            mesh.faces =
                read_inline_array::<Face>(native.faces, native.num_faces as usize, "mesh faces")?;
            mesh.bones =
                read_pointer_array::<Bone>(native.bones, native.num_bones as usize, "mesh bones")?;
        }
        mesh.uv_component_count = native.num_uv_components;
        mesh.material_index = native.material_index as usize;
        Ok(mesh)
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiMesh, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let mesh = unsafe { *native };
        arena.free_address(mesh.vertices);
        arena.free_address(mesh.normals);
        arena.free_address(mesh.tangents);
        arena.free_address(mesh.bitangents);
        for p in mesh.colors {
            arena.free_address(p);
        }
        for p in mesh.texture_coords {
            arena.free_address(p);
        }
        // SAFETY: arrays are valid for their declared counts per the contract.
        unsafe {
            free_inline_array::<Face>(arena, mesh.faces, mesh.num_faces as usize);
            free_pointer_array::<Bone>(arena, mesh.bones, mesh.num_bones as usize);
        }
        if free_self {
            arena.free_address(native);
        }
    }
}
