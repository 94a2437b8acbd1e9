//! Ready-made scenes and OBJ sources for tests and benchmarks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use loam_core::{
    Animation, AnimationBehaviour, Bone, Camera, Color3D, Color4D, EmbeddedTexture, Face, Light,
    LightSourceType, Material, Matrix4x4, Mesh, Node, NodeAnimationChannel, PrimitiveType,
    Quaternion, QuaternionKey, Scene, Texel, TextureType, Vector3D, VectorKey, VertexWeight,
};

/// One triangle, one object.
pub const TRIANGLE_OBJ: &str = "\
# triangle
o triangle
v 1 0 0
v 5 5 0
v 10 0 0
f 1 2 3
";

/// Two objects sharing a material library.
pub const TWO_OBJECTS_OBJ: &str = "\
mtllib two.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
o floor
usemtl stone
f 1/1/1 2/2/1 3/3/1 4/4/1
o marker
usemtl brass
f 1//1 2//1 3//1
";

/// Materials for [`TWO_OBJECTS_OBJ`].
pub const TWO_OBJECTS_MTL: &str = "\
newmtl stone
Kd 0.5 0.5 0.5
map_Kd stone.png

newmtl brass
Kd 0.8 0.6 0.2
Ks 1 1 1
Ns 64
d 0.9
";

/// Write `contents` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// The triangle `(1,0,0) (5,5,0) (10,0,0)` with face `[0, 1, 2]` and one
/// red material, under a root node.
pub fn triangle_scene() -> Scene {
    let mut mesh = Mesh::new("triangle", PrimitiveType::TRIANGLE);
    mesh.vertices = vec![
        Vector3D::new(1.0, 0.0, 0.0),
        Vector3D::new(5.0, 5.0, 0.0),
        Vector3D::new(10.0, 0.0, 0.0),
    ];
    mesh.faces = vec![Face::new([0, 1, 2])];

    let mut red = Material::named("red");
    red.set_color_diffuse(Color4D::new(1.0, 0.0, 0.0, 1.0));

    let mut root = Node::new("root");
    root.add_child(Node::new("triangle")).mesh_indices = vec![0];

    Scene {
        root_node: Some(root),
        meshes: vec![mesh],
        materials: vec![red],
        ..Scene::new()
    }
}

/// A unit quad with normals, UVs, a vertex colour channel, and a textured
/// material.
pub fn textured_quad_scene() -> Scene {
    let mut mesh = Mesh::new("quad", PrimitiveType::TRIANGLE);
    mesh.vertices = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(1.0, 0.0, 0.0),
        Vector3D::new(1.0, 1.0, 0.0),
        Vector3D::new(0.0, 1.0, 0.0),
    ];
    mesh.normals = vec![Vector3D::new(0.0, 0.0, 1.0); 4];
    mesh.texture_coordinate_channels[0] = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(1.0, 0.0, 0.0),
        Vector3D::new(1.0, 1.0, 0.0),
        Vector3D::new(0.0, 1.0, 0.0),
    ];
    mesh.uv_component_count[0] = 2;
    mesh.vertex_color_channels[0] = vec![Color4D::new(1.0, 1.0, 1.0, 1.0); 4];
    mesh.faces = vec![Face::new([0, 1, 2]), Face::new([0, 2, 3])];

    let mut material = Material::named("checker");
    material.set_texture_file(TextureType::Diffuse, 0, "*0");
    material.set_shininess(32.0);

    let texture = EmbeddedTexture::Uncompressed {
        width: 2,
        height: 2,
        texels: vec![
            Texel::rgba(255, 255, 255, 255),
            Texel::rgba(0, 0, 0, 255),
            Texel::rgba(0, 0, 0, 255),
            Texel::rgba(255, 255, 255, 255),
        ],
    };

    let mut root = Node::new("root");
    root.mesh_indices = vec![0];

    Scene {
        root_node: Some(root),
        meshes: vec![mesh],
        materials: vec![material],
        textures: vec![texture],
        ..Scene::new()
    }
}

/// Two meshes under a nested, translated hierarchy, plus a camera and two
/// lights.
pub fn hierarchy_scene() -> Scene {
    let mut ground = Mesh::new("ground", PrimitiveType::POLYGON);
    ground.vertices = vec![
        Vector3D::new(-1.0, 0.0, -1.0),
        Vector3D::new(1.0, 0.0, -1.0),
        Vector3D::new(1.0, 0.0, 1.0),
        Vector3D::new(-1.0, 0.0, 1.0),
    ];
    ground.faces = vec![Face::new([0, 1, 2, 3])];

    let mut pole = Mesh::new("pole", PrimitiveType::LINE);
    pole.vertices = vec![Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(0.0, 2.0, 0.0)];
    pole.faces = vec![Face::new([0, 1])];
    pole.material_index = 1;

    let mut root = Node::new("world");
    root.add_child(Node::new("ground")).mesh_indices = vec![0];
    let rig = root.add_child(Node::new("rig"));
    rig.transform = Matrix4x4::from_translation(Vector3D::new(0.0, 0.0, 3.0));
    rig.add_child(Node::new("pole")).mesh_indices = vec![1];

    let mut camera = Camera::new("eye");
    camera.position = Vector3D::new(0.0, 1.5, -5.0);
    camera.aspect_ratio = 16.0 / 9.0;

    let mut sun = Light::new("sun", LightSourceType::Directional);
    sun.direction = Vector3D::new(0.0, -1.0, 0.0);
    sun.color_diffuse = Color3D::new(1.0, 0.95, 0.9);
    let mut lamp = Light::new("lamp", LightSourceType::Spot);
    lamp.position = Vector3D::new(0.0, 2.0, 3.0);
    lamp.angle_inner_cone = 0.3;
    lamp.angle_outer_cone = 0.5;

    Scene {
        root_node: Some(root),
        meshes: vec![ground, pole],
        materials: vec![Material::named("grass"), Material::named("steel")],
        cameras: vec![camera],
        lights: vec![sun, lamp],
        ..Scene::new()
    }
}

/// A skinned triangle with one bone, a keyframed clip, and a compressed
/// embedded texture.
pub fn animated_scene() -> Scene {
    let mut scene = triangle_scene();
    scene.meshes[0].bones = vec![Bone {
        name: "triangle".into(),
        weights: vec![
            VertexWeight::new(0, 1.0),
            VertexWeight::new(1, 0.5),
            VertexWeight::new(2, 0.25),
        ],
        offset_matrix: Matrix4x4::from_translation(Vector3D::new(-1.0, 0.0, 0.0)),
    }];

    let mut channel = NodeAnimationChannel::new("triangle");
    channel.position_keys = vec![
        VectorKey::new(0.0, Vector3D::ZERO),
        VectorKey::new(10.0, Vector3D::new(0.0, 4.0, 0.0)),
    ];
    channel.rotation_keys = vec![
        QuaternionKey::new(0.0, Quaternion::IDENTITY),
        QuaternionKey::new(10.0, Quaternion::new(0.0, 0.0, 1.0, 0.0)),
    ];
    channel.scaling_keys = vec![VectorKey::new(0.0, Vector3D::new(1.0, 1.0, 1.0))];
    channel.post_state = AnimationBehaviour::Repeat;

    let mut clip = Animation::new("bounce", 10.0, 25.0);
    clip.node_channels = vec![channel];
    scene.animations = vec![clip];

    scene.textures = vec![EmbeddedTexture::Compressed {
        format_hint: "png".into(),
        data: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
    }];
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_internally_consistent() {
        for scene in [
            triangle_scene(),
            textured_quad_scene(),
            hierarchy_scene(),
            animated_scene(),
        ] {
            scene.validate_references().unwrap();
        }
    }

    #[test]
    fn fixture_files_land_in_dir() {
        let dir = std::env::temp_dir().join(format!("loam-fixture-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = write_fixture(&dir, "tri.obj", TRIANGLE_OBJ).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), TRIANGLE_OBJ);
        fs::remove_dir_all(&dir).unwrap();
    }
}
