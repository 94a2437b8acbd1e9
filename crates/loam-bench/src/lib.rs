//! Benchmark profiles for the Loam interop layer.
//!
//! Provides pre-built scenes and OBJ sources sized for benchmarking:
//!
//! - [`grid_scene`]: one triangulated `side x side` grid with normals and UVs
//! - [`deep_hierarchy_scene`]: a node tree of given depth and fan-out
//! - [`grid_obj`]: the same grid as OBJ text, for import benchmarks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt::Write;

use loam_core::{Face, Material, Matrix4x4, Mesh, Node, PrimitiveType, Scene, Vector3D};

/// Build a flat grid of `side x side` cells, two triangles per cell.
///
/// `(side + 1)^2` vertices, each with a normal and a 2D UV.
pub fn grid_scene(side: u32) -> Scene {
    let row = side + 1;
    let mut mesh = Mesh::new("grid", PrimitiveType::TRIANGLE);
    for y in 0..row {
        for x in 0..row {
            let (u, v) = (x as f32 / side as f32, y as f32 / side as f32);
            mesh.vertices.push(Vector3D::new(x as f32, y as f32, 0.0));
            mesh.normals.push(Vector3D::new(0.0, 0.0, 1.0));
            mesh.texture_coordinate_channels[0].push(Vector3D::new(u, v, 0.0));
        }
    }
    mesh.uv_component_count[0] = 2;
    for y in 0..side {
        for x in 0..side {
            let a = y * row + x;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            mesh.faces.push(Face::new([a, b, d]));
            mesh.faces.push(Face::new([a, d, c]));
        }
    }

    let mut root = Node::new("grid_root");
    root.mesh_indices = vec![0];
    Scene {
        root_node: Some(root),
        meshes: vec![mesh],
        materials: vec![Material::named("grid")],
        ..Scene::new()
    }
}

/// Build a node tree `depth` levels deep with `fanout` children per node.
///
/// Every leaf references the single mesh of [`grid_scene`]`(1)`.
pub fn deep_hierarchy_scene(depth: u32, fanout: u32) -> Scene {
    fn grow(node: &mut Node, depth: u32, fanout: u32) {
        if depth == 0 {
            node.mesh_indices = vec![0];
            return;
        }
        for i in 0..fanout {
            let child = node.add_child(Node::new(format!("{}/{i}", node.name)));
            child.transform = Matrix4x4::from_translation(Vector3D::new(i as f32, 0.0, 0.0));
            grow(child, depth - 1, fanout);
        }
    }

    let mut scene = grid_scene(1);
    let mut root = Node::new("n");
    grow(&mut root, depth, fanout);
    scene.root_node = Some(root);
    scene
}

/// The grid of [`grid_scene`] as OBJ text, with `v`, `vt`, `vn`, and
/// `v/vt/vn` triangle faces.
pub fn grid_obj(side: u32) -> String {
    let row = side + 1;
    let mut out = String::from("o grid\n");
    for y in 0..row {
        for x in 0..row {
            let _ = writeln!(out, "v {x} {y} 0");
        }
    }
    for y in 0..row {
        for x in 0..row {
            let _ = writeln!(out, "vt {} {}", x as f32 / side as f32, y as f32 / side as f32);
        }
    }
    out.push_str("vn 0 0 1\n");
    for y in 0..side {
        for x in 0..side {
            let a = y * row + x + 1;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            let _ = writeln!(out, "f {a}/{a}/1 {b}/{b}/1 {d}/{d}/1");
            let _ = writeln!(out, "f {a}/{a}/1 {d}/{d}/1 {c}/{c}/1");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_scene_validates() {
        let scene = grid_scene(8);
        scene.validate_references().unwrap();
        assert_eq!(scene.meshes[0].vertex_count(), 81);
        assert_eq!(scene.meshes[0].face_count(), 128);
        let max = scene.meshes[0].indices().into_iter().max().unwrap();
        assert_eq!(max, 80);
    }

    #[test]
    fn hierarchy_has_expected_node_count() {
        let scene = deep_hierarchy_scene(3, 4);
        scene.validate_references().unwrap();
        // 1 + 4 + 16 + 64
        assert_eq!(scene.root_node.as_ref().unwrap().subtree_len(), 85);
    }

    #[test]
    fn grid_obj_has_two_faces_per_cell() {
        let text = grid_obj(4);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 32);
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 25);
    }
}
