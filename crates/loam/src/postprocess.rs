//! Post-processing steps requested at import (or applied before export).

use bitflags::bitflags;

bitflags! {
    /// Steps the native library runs over a scene. Values match
    /// `aiPostProcessSteps` and are passed through unchanged.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PostProcessSteps: u32 {
        /// Compute tangents and bitangents.
        const CALC_TANGENT_SPACE = 0x1;
        /// Merge identical vertices within each mesh.
        const JOIN_IDENTICAL_VERTICES = 0x2;
        /// Convert to a left-handed coordinate system.
        const MAKE_LEFT_HANDED = 0x4;
        /// Split polygons into triangles.
        const TRIANGULATE = 0x8;
        /// Drop the components named by the remove-component property.
        const REMOVE_COMPONENT = 0x10;
        /// Generate flat normals where missing.
        const GEN_NORMALS = 0x20;
        /// Generate smooth normals where missing.
        const GEN_SMOOTH_NORMALS = 0x40;
        /// Split meshes over the vertex or face limit.
        const SPLIT_LARGE_MESHES = 0x80;
        /// Bake node transforms into vertices and flatten the hierarchy.
        const PRE_TRANSFORM_VERTICES = 0x100;
        /// Keep at most four bone weights per vertex.
        const LIMIT_BONE_WEIGHTS = 0x200;
        /// Run the library's structure validator.
        const VALIDATE_DATA_STRUCTURE = 0x400;
        /// Reorder triangles for vertex cache locality.
        const IMPROVE_CACHE_LOCALITY = 0x800;
        /// Merge duplicate materials and drop unused ones.
        const REMOVE_REDUNDANT_MATERIALS = 0x1000;
        /// Flip normals that point inwards.
        const FIX_INFACING_NORMALS = 0x2000;
        /// Split meshes so each holds one primitive type.
        const SORT_BY_PTYPE = 0x8000;
        /// Remove or convert degenerate primitives.
        const FIND_DEGENERATES = 0x10000;
        /// Zero out invalid normals and UVs.
        const FIND_INVALID_DATA = 0x20000;
        /// Convert procedural mappings to UV channels.
        const GEN_UV_COORDS = 0x40000;
        /// Apply UV transforms stored in materials.
        const TRANSFORM_UV_COORDS = 0x80000;
        /// Share meshes that are duplicates of one another.
        const FIND_INSTANCES = 0x100000;
        /// Merge small meshes.
        const OPTIMIZE_MESHES = 0x200000;
        /// Collapse nodes without animations, bones, or lights.
        const OPTIMIZE_GRAPH = 0x400000;
        /// Flip the V texture coordinate.
        const FLIP_UVS = 0x800000;
        /// Reverse face winding to clockwise.
        const FLIP_WINDING_ORDER = 0x1000000;
        /// Split meshes with too many bones.
        const SPLIT_BY_BONE_COUNT = 0x2000000;
        /// Remove bones that do not deform.
        const DEBONE = 0x4000000;
    }
}

impl PostProcessSteps {
    /// Everything needed to move to a left-handed, clockwise, top-left UV
    /// convention (Direct3D style).
    pub const CONVERT_TO_LEFT_HANDED: Self = Self::MAKE_LEFT_HANDED
        .union(Self::FLIP_UVS)
        .union(Self::FLIP_WINDING_ORDER);

    /// Fast preparation for real-time rendering.
    pub const TARGET_REALTIME_FAST: Self = Self::CALC_TANGENT_SPACE
        .union(Self::GEN_NORMALS)
        .union(Self::JOIN_IDENTICAL_VERTICES)
        .union(Self::TRIANGULATE)
        .union(Self::GEN_UV_COORDS)
        .union(Self::SORT_BY_PTYPE);

    /// Slower, higher quality preparation for real-time rendering.
    pub const TARGET_REALTIME_QUALITY: Self = Self::CALC_TANGENT_SPACE
        .union(Self::GEN_SMOOTH_NORMALS)
        .union(Self::JOIN_IDENTICAL_VERTICES)
        .union(Self::IMPROVE_CACHE_LOCALITY)
        .union(Self::LIMIT_BONE_WEIGHTS)
        .union(Self::REMOVE_REDUNDANT_MATERIALS)
        .union(Self::SPLIT_LARGE_MESHES)
        .union(Self::TRIANGULATE)
        .union(Self::GEN_UV_COORDS)
        .union(Self::SORT_BY_PTYPE)
        .union(Self::FIND_DEGENERATES)
        .union(Self::FIND_INVALID_DATA);

    /// Every optimisation the quality preset does, plus instancing and
    /// validation.
    pub const TARGET_REALTIME_MAX_QUALITY: Self = Self::TARGET_REALTIME_QUALITY
        .union(Self::FIND_INSTANCES)
        .union(Self::VALIDATE_DATA_STRUCTURE)
        .union(Self::OPTIMIZE_MESHES);
}
