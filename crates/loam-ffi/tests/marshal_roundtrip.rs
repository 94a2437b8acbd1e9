//! Integration test: every marshaling contract reproduces its input.
//!
//! Each value is written into a fresh arena with `alloc_boxed`, read back
//! with `from_native`, and freed with `free_native`. The read-back value
//! must equal the input and the arena must end with no live blocks.

use loam_arena::NativeArena;
use loam_core::{
    Camera, Color4D, ExportDataBlob, Face, Light, LightSourceType, Material, MaterialProperty,
    Mesh, Node, PrimitiveType, Vector3D,
};
use loam_ffi::marshal::alloc_boxed;
use loam_ffi::{export_scene, free_scene, import_scene, Marshal, NativeScene};
use loam_test_utils::fixtures;
use proptest::prelude::*;

#[allow(unsafe_code)]
fn round_trip<T: Marshal>(value: &T) -> (T, usize) {
    let arena = NativeArena::with_defaults();
    let ptr = alloc_boxed(&arena, value).unwrap();
    // SAFETY: `ptr` was just written by `alloc_boxed`.
    let back = unsafe { T::from_native(&*ptr) }.unwrap();
    // SAFETY: freed once, not used afterwards.
    unsafe { T::free_native(&arena, ptr, true) };
    (back, arena.live_allocations())
}

// ── Strategies ───────────────────────────────────────────────────────

fn finite() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn vec3() -> impl Strategy<Value = Vector3D> {
    (finite(), finite(), finite()).prop_map(|(x, y, z)| Vector3D::new(x, y, z))
}

fn name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ ]{0,24}"
}

fn camera() -> impl Strategy<Value = Camera> {
    (name(), vec3(), vec3(), vec3(), finite(), finite(), finite(), finite()).prop_map(
        |(name, position, up, direction, fov, near, far, aspect)| Camera {
            name,
            position,
            up,
            direction,
            field_of_view: fov,
            clip_plane_near: near,
            clip_plane_far: far,
            aspect_ratio: aspect,
        },
    )
}

fn light() -> impl Strategy<Value = Light> {
    (name(), 0u32..6, vec3(), vec3(), finite(), finite()).prop_map(
        |(name, kind, position, direction, linear, cone)| {
            let mut light = Light::new(name, LightSourceType::from_raw(kind));
            light.position = position;
            light.direction = direction;
            light.attenuation_linear = linear;
            light.angle_outer_cone = cone;
            light
        },
    )
}

fn mesh() -> impl Strategy<Value = Mesh> {
    (1usize..24)
        .prop_flat_map(|n| {
            (
                name(),
                prop::collection::vec(vec3(), n),
                prop::bool::ANY,
                prop::collection::vec(prop::collection::vec(0..n as u32, 1..6), 0..12),
                0usize..4,
            )
        })
        .prop_map(|(name, vertices, with_normals, faces, material_index)| {
            let mut mesh = Mesh::new(name, PrimitiveType::empty());
            if with_normals {
                mesh.normals = vertices.iter().map(|v| Vector3D::new(v.z, v.x, v.y)).collect();
            }
            mesh.vertices = vertices;
            mesh.faces = faces.into_iter().map(Face::new).collect();
            mesh.material_index = material_index;
            mesh.update_primitive_types();
            mesh
        })
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = (name(), prop::collection::vec(0usize..64, 0..3)).prop_map(|(name, meshes)| {
        let mut node = Node::new(name);
        node.mesh_indices = meshes;
        node
    });
    leaf.prop_recursive(4, 32, 4, |inner| {
        (name(), prop::collection::vec(inner, 0..4)).prop_map(|(name, children)| Node {
            children,
            ..Node::new(name)
        })
    })
}

fn material() -> impl Strategy<Value = Material> {
    (
        name(),
        prop::collection::vec(finite(), 1..5),
        prop::collection::vec(any::<i32>(), 0..4),
        prop::collection::vec(any::<u8>(), 0..16),
    )
        .prop_map(|(name, floats, ints, bytes)| {
            let mut material = Material::named(&name);
            material.add_property(MaterialProperty::from_floats("$test.floats", &floats));
            if !ints.is_empty() {
                material.add_property(MaterialProperty::from_integers("$test.ints", &ints));
            }
            material.add_property(MaterialProperty {
                name: "$test.raw".into(),
                property_type: loam_core::PropertyType::Buffer,
                texture_type: Default::default(),
                texture_index: 0,
                data: bytes,
            });
            material
        })
}

fn blob_chain() -> impl Strategy<Value = ExportDataBlob> {
    prop::collection::vec(
        ("[a-z]{0,3}", prop::collection::vec(any::<u8>(), 0..64)),
        1..6,
    )
    .prop_map(|parts| {
        let blobs = parts
            .into_iter()
            .map(|(name, data)| ExportDataBlob::new(name, data))
            .collect();
        ExportDataBlob::from_chain(blobs).unwrap()
    })
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cameras_round_trip(value in camera()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }

    #[test]
    fn lights_round_trip(value in light()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }

    #[test]
    fn meshes_round_trip(value in mesh()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }

    #[test]
    fn node_trees_round_trip(value in node()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back.subtree_len(), value.subtree_len());
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }

    #[test]
    fn materials_round_trip(value in material()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }

    #[test]
    fn blob_chains_round_trip(value in blob_chain()) {
        let (back, live) = round_trip(&value);
        prop_assert_eq!(back.chain_len(), value.chain_len());
        prop_assert_eq!(back, value);
        prop_assert_eq!(live, 0);
    }
}

// ── Whole scenes ─────────────────────────────────────────────────────

#[test]
#[allow(unsafe_code)]
fn fixture_scenes_round_trip_and_balance() {
    for scene in [
        fixtures::triangle_scene(),
        fixtures::textured_quad_scene(),
        fixtures::hierarchy_scene(),
        fixtures::animated_scene(),
    ] {
        let arena = NativeArena::with_defaults();
        let ptr = export_scene(&scene, &arena).unwrap();
        // SAFETY: `ptr` was just produced by `export_scene`.
        let back = unsafe { import_scene(ptr) }.unwrap();
        assert_eq!(back, scene);
        // SAFETY: freed once.
        unsafe { free_scene(&arena, ptr, true) };
        assert_eq!(arena.live_allocations(), 0);
    }
}

#[test]
fn repeated_exports_share_nothing() {
    let scene = fixtures::hierarchy_scene();
    let a = NativeScene::export(&scene).unwrap();
    let b = NativeScene::export(&scene).unwrap();
    assert_ne!(a.as_ptr(), b.as_ptr());
    assert_eq!(a.arena().live_allocations(), b.arena().live_allocations());
    drop(a);
    assert_eq!(b.to_scene().unwrap(), scene);
}

#[test]
fn material_colours_survive_scene_export() {
    let mut scene = fixtures::triangle_scene();
    scene.materials[0].set_color_specular(Color4D::new(0.25, 0.5, 0.75, 1.0));
    let native = NativeScene::export(&scene).unwrap();
    let back = native.to_scene().unwrap();
    assert_eq!(
        back.materials[0].color_specular(),
        Some(Color4D::new(0.25, 0.5, 0.75, 1.0))
    );
}
