//! Integration test: whole-scene import and export through the mock
//! library.

use loam_core::{InteropError, TextureType};
use loam_ffi::transfer;
use loam_test_utils::{fixtures, MockLibrary};

#[test]
fn file_import_reads_companion_materials() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::write_fixture(dir.path(), "two.obj", fixtures::TWO_OBJECTS_OBJ).unwrap();
    fixtures::write_fixture(dir.path(), "two.mtl", fixtures::TWO_OBJECTS_MTL).unwrap();

    let mock = MockLibrary::new();
    let scene = transfer::import_file(&mock, &path, 0).unwrap();

    assert_eq!(scene.meshes.len(), 2);
    assert_eq!(scene.meshes[0].name, "floor");
    assert_eq!(scene.meshes[0].vertex_count(), 4);
    assert!(scene.meshes[0].has_normals());
    assert!(scene.meshes[0].has_texture_coords(0));
    assert_eq!(scene.meshes[1].indices(), vec![0, 1, 2]);
    assert!(!scene.meshes[1].has_texture_coords(0));

    let names: Vec<String> = scene.materials.iter().map(|m| m.name()).collect();
    assert_eq!(names, ["DefaultMaterial", "stone", "brass"]);
    assert_eq!(
        scene.materials[1].texture_file(TextureType::Diffuse, 0).as_deref(),
        Some("stone.png")
    );
    assert_eq!(scene.materials[2].shininess(), Some(64.0));
    assert_eq!(scene.root_node.as_ref().unwrap().name, "two.obj");
    assert_eq!(mock.live_allocations(), 0);
}

#[test]
fn failed_import_carries_library_message() {
    let mock = MockLibrary::new();
    let err = transfer::import_memory(&mock, b"v 0 0 0\nf 1 2 3\n", 0, "obj").unwrap_err();
    match err {
        InteropError::ImportFailed { reason } => assert!(reason.contains("line 2"), "{reason}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn nul_in_hint_is_rejected_before_the_call() {
    let mock = MockLibrary::new();
    let err = transfer::import_memory(&mock, b"", 0, "o\0bj").unwrap_err();
    assert!(matches!(err, InteropError::MarshalFailure { .. }));
    assert_eq!(mock.import_calls(), 0);
}

#[test]
fn unsupported_format_never_reaches_the_library() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("scene.fbx");
    let mock = MockLibrary::new();
    let err =
        transfer::export_file(&mock, &fixtures::triangle_scene(), "fbx", &out, 0).unwrap_err();
    assert!(matches!(err, InteropError::UnsupportedFormat { format_id } if format_id == "fbx"));
    assert_eq!(mock.export_calls(), 0);
    assert!(!out.exists());
}

#[test]
fn blob_export_is_obj_then_mtl() {
    let mock = MockLibrary::new();
    let chain = transfer::export_blob(&mock, &fixtures::triangle_scene(), "obj", 0).unwrap();
    assert_eq!(chain.chain_len(), 2);
    assert!(chain.has_data());
    assert_eq!(chain.name, "");
    let mtl = chain.find("mtl").unwrap();
    assert!(String::from_utf8_lossy(&mtl.data).contains("newmtl red"));
    assert_eq!(mock.outstanding_blobs(), 0);
    assert_eq!(mock.live_allocations(), 0);
}

#[test]
fn invalid_scene_fails_before_export() {
    let mock = MockLibrary::new();
    let mut scene = fixtures::triangle_scene();
    scene.meshes[0].faces[0] = loam_core::Face::new([0, 1, 7]);
    let err = transfer::export_blob(&mock, &scene, "obj", 0).unwrap_err();
    assert!(matches!(err, InteropError::MarshalFailure { .. }));
    assert_eq!(mock.export_calls(), 0);
}
