//! Layout declarations for every native struct.
//!
//! Sizes are the Assimp 4.1 values on 64-bit targets. [`describe_all`]
//! validates every declaration; [`verify_reported_sizes`] compares them
//! with what a loaded library says about itself.

use indexmap::IndexMap;
use loam_arena::descriptor::{describe, FieldLayout, NativeLayout, StructLayout};
use loam_arena::field_layout;
use loam_core::InteropError;

use crate::types::*;

macro_rules! native_layout {
    ($ty:ty, $name:literal, $size:expr, blittable: $blit:expr, [$($field:ident),* $(,)?]) => {
        impl NativeLayout for $ty {
            const NAME: &'static str = $name;
            const NATIVE_SIZE: usize = $size;
            const BLITTABLE: bool = $blit;

            fn fields() -> Vec<FieldLayout> {
                vec![$(field_layout!($ty, $field)),*]
            }
        }
    };
}

native_layout!(AiString, "aiString", 1028, blittable: false, [length, data]);
native_layout!(AiVector2D, "aiVector2D", 8, blittable: true, [x, y]);
native_layout!(AiVector3D, "aiVector3D", 12, blittable: true, [x, y, z]);
native_layout!(AiColor3D, "aiColor3D", 12, blittable: true, [r, g, b]);
native_layout!(AiColor4D, "aiColor4D", 16, blittable: true, [r, g, b, a]);
native_layout!(AiQuaternion, "aiQuaternion", 16, blittable: true, [w, x, y, z]);
native_layout!(AiMatrix4x4, "aiMatrix4x4", 64, blittable: true, [
    a1, a2, a3, a4, b1, b2, b3, b4, c1, c2, c3, c4, d1, d2, d3, d4,
]);
native_layout!(AiTexel, "aiTexel", 4, blittable: true, [b, g, r, a]);
native_layout!(AiFace, "aiFace", 16, blittable: false, [num_indices, indices]);
native_layout!(AiVertexWeight, "aiVertexWeight", 8, blittable: true, [vertex_id, weight]);
native_layout!(AiBone, "aiBone", 1104, blittable: false, [
    name, num_weights, weights, offset_matrix,
]);
native_layout!(AiMesh, "aiMesh", 1288, blittable: false, [
    primitive_types, num_vertices, num_faces, vertices, normals, tangents,
    bitangents, colors, texture_coords, num_uv_components, faces, num_bones,
    bones, material_index, name, num_anim_meshes, anim_meshes, method,
]);
native_layout!(AiMaterialProperty, "aiMaterialProperty", 1056, blittable: false, [
    key, semantic, index, data_length, property_type, data,
]);
native_layout!(AiMaterial, "aiMaterial", 16, blittable: false, [
    properties, num_properties, num_allocated,
]);
native_layout!(AiNode, "aiNode", 1144, blittable: false, [
    name, transformation, parent, num_children, children, num_meshes, meshes, meta_data,
]);
native_layout!(AiCamera, "aiCamera", 1080, blittable: false, [
    name, position, up, look_at, horizontal_fov, clip_plane_near, clip_plane_far, aspect,
]);
native_layout!(AiLight, "aiLight", 1132, blittable: false, [
    name, light_type, position, direction, up, attenuation_constant,
    attenuation_linear, attenuation_quadratic, color_diffuse, color_specular,
    color_ambient, angle_inner_cone, angle_outer_cone, size,
]);
native_layout!(AiVectorKey, "aiVectorKey", 24, blittable: false, [time, value]);
native_layout!(AiQuatKey, "aiQuatKey", 24, blittable: true, [time, value]);
native_layout!(AiNodeAnim, "aiNodeAnim", 1080, blittable: false, [
    node_name, num_position_keys, position_keys, num_rotation_keys, rotation_keys,
    num_scaling_keys, scaling_keys, pre_state, post_state,
]);
native_layout!(AiAnimation, "aiAnimation", 1096, blittable: false, [
    name, duration, ticks_per_second, num_channels, channels, num_mesh_channels,
    mesh_channels, num_morph_mesh_channels, morph_mesh_channels,
]);
native_layout!(AiTexture, "aiTexture", 24, blittable: false, [width, height, format_hint, data]);
native_layout!(AiScene, "aiScene", 120, blittable: false, [
    flags, root_node, num_meshes, meshes, num_materials, materials, num_animations,
    animations, num_textures, textures, num_lights, lights, num_cameras, cameras, private,
]);
native_layout!(AiExportDataBlob, "aiExportDataBlob", 1056, blittable: false, [
    size, data, name, next,
]);
native_layout!(AiLogStream, "aiLogStream", 16, blittable: false, [callback, user]);
native_layout!(AiExportFormatDesc, "aiExportFormatDesc", 24, blittable: false, [
    id, description, file_extension,
]);

/// Validate and return every native layout, in a stable order.
pub fn describe_all() -> Result<Vec<&'static StructLayout>, InteropError> {
    Ok(vec![
        describe::<AiString>()?,
        describe::<AiVector2D>()?,
        describe::<AiVector3D>()?,
        describe::<AiColor3D>()?,
        describe::<AiColor4D>()?,
        describe::<AiQuaternion>()?,
        describe::<AiMatrix4x4>()?,
        describe::<AiTexel>()?,
        describe::<AiFace>()?,
        describe::<AiVertexWeight>()?,
        describe::<AiBone>()?,
        describe::<AiMesh>()?,
        describe::<AiMaterialProperty>()?,
        describe::<AiMaterial>()?,
        describe::<AiNode>()?,
        describe::<AiCamera>()?,
        describe::<AiLight>()?,
        describe::<AiVectorKey>()?,
        describe::<AiQuatKey>()?,
        describe::<AiNodeAnim>()?,
        describe::<AiAnimation>()?,
        describe::<AiTexture>()?,
        describe::<AiScene>()?,
        describe::<AiExportDataBlob>()?,
        describe::<AiLogStream>()?,
        describe::<AiExportFormatDesc>()?,
    ])
}

/// Native name → size for every declared struct.
pub fn native_sizes() -> Result<IndexMap<&'static str, usize>, InteropError> {
    Ok(describe_all()?
        .into_iter()
        .map(|l| (l.name, l.size))
        .collect())
}

/// Check every layout against sizes reported by a loaded library.
///
/// `reported` returns `None` for types the library does not report on;
/// those are skipped.
pub fn verify_reported_sizes(
    reported: &dyn Fn(&str) -> Option<usize>,
) -> Result<(), InteropError> {
    for layout in describe_all()? {
        if let Some(size) = reported(layout.name) {
            layout.verify_native_size(size)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_layout_validates() {
        let layouts = describe_all().unwrap();
        assert_eq!(layouts.len(), 26);
        let blittable: Vec<_> = layouts
            .iter()
            .filter(|l| l.blittable)
            .map(|l| l.name)
            .collect();
        assert!(blittable.contains(&"aiQuatKey"));
        assert!(!blittable.contains(&"aiVectorKey"));
    }

    #[test]
    fn mesh_field_offsets() {
        let mesh = describe::<AiMesh>().unwrap();
        assert_eq!(mesh.field("vertices").map(|f| f.offset), Some(16));
        assert_eq!(mesh.field("faces").map(|f| f.offset), Some(208));
        assert_eq!(mesh.field("name").map(|f| f.offset), Some(236));
    }

    #[test]
    fn node_parent_follows_transform() {
        let node = describe::<AiNode>().unwrap();
        assert_eq!(node.field("transformation").map(|f| f.offset), Some(1028));
        assert_eq!(node.field("parent").map(|f| f.offset), Some(1096));
    }

    #[test]
    fn reported_mismatch_is_invalid_layout() {
        let err = verify_reported_sizes(&|name| (name == "aiMesh").then_some(1280)).unwrap_err();
        match err {
            InteropError::InvalidLayout {
                type_name,
                expected,
                actual,
            } => {
                assert_eq!(type_name, "aiMesh");
                assert_eq!(expected, 1280);
                assert_eq!(actual, 1288);
            }
            other => panic!("expected InvalidLayout, got {other:?}"),
        }
        verify_reported_sizes(&|_| None).unwrap();
    }
}
