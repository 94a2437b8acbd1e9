//! The scene root.

use bitflags::bitflags;

use crate::animation::Animation;
use crate::camera::Camera;
use crate::error::InteropError;
use crate::light::Light;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::node::Node;
use crate::texture::EmbeddedTexture;

bitflags! {
    /// Scene status flags. Values match `AI_SCENE_FLAGS_*`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SceneFlags: u32 {
        /// The import was incomplete (e.g. animation-only files).
        const INCOMPLETE = 0x1;
        /// Validation passed.
        const VALIDATED = 0x2;
        /// Validation passed with warnings.
        const VALIDATION_WARNING = 0x4;
        /// Vertices are not deduplicated.
        const NON_VERBOSE_FORMAT = 0x8;
        /// The scene is a height-map terrain.
        const TERRAIN = 0x10;
    }
}

/// A complete scene: a node hierarchy plus flat entity lists that nodes and
/// meshes reference by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Status flags.
    pub flags: SceneFlags,
    /// Root of the node hierarchy.
    pub root_node: Option<Node>,
    /// Meshes, referenced by [`Node::mesh_indices`].
    pub meshes: Vec<Mesh>,
    /// Materials, referenced by [`Mesh::material_index`].
    pub materials: Vec<Material>,
    /// Animation clips.
    pub animations: Vec<Animation>,
    /// Embedded textures, referenced by `*N` texture paths.
    pub textures: Vec<EmbeddedTexture>,
    /// Lights.
    pub lights: Vec<Light>,
    /// Cameras.
    pub cameras: Vec<Camera>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Number of animations.
    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    /// Number of embedded textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of lights.
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Number of cameras.
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Whether the scene has any meshes.
    pub fn has_meshes(&self) -> bool {
        !self.meshes.is_empty()
    }

    /// Meshes attached to `node`, resolved through the index table.
    /// Indices that do not resolve are skipped.
    pub fn node_meshes<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Mesh> + 'a {
        node.mesh_indices.iter().filter_map(|&i| self.meshes.get(i))
    }

    /// Material of `mesh`, resolved through the index table.
    pub fn mesh_material(&self, mesh: &Mesh) -> Option<&Material> {
        self.materials.get(mesh.material_index)
    }

    /// Check every index reference and per-vertex stream length.
    ///
    /// Runs before any native memory is allocated for an export, so a scene
    /// that fails here never reaches the native library.
    pub fn validate_references(&self) -> Result<(), InteropError> {
        if let Some(root) = &self.root_node {
            let mut bad = None;
            root.walk(&mut |node| {
                if bad.is_some() {
                    return;
                }
                if let Some(&i) = node.mesh_indices.iter().find(|&&i| i >= self.meshes.len()) {
                    bad = Some(format!(
                        "node '{}' references mesh {i} but the scene has {} meshes",
                        node.name,
                        self.meshes.len()
                    ));
                }
            });
            if let Some(reason) = bad {
                return Err(InteropError::MarshalFailure { reason });
            }
        }

        for (mi, mesh) in self.meshes.iter().enumerate() {
            if mesh.material_index >= self.materials.len() {
                return Err(InteropError::marshal(format!(
                    "mesh {mi} references material {} but the scene has {} materials",
                    mesh.material_index,
                    self.materials.len()
                )));
            }
            if let Some(problem) = mesh.stream_problem() {
                return Err(InteropError::marshal(format!("mesh {mi}: {problem}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3D;
    use crate::mesh::{Face, PrimitiveType};

    fn triangle_scene() -> Scene {
        let mut mesh = Mesh::new("tri", PrimitiveType::TRIANGLE);
        mesh.vertices = vec![
            Vector3D::new(1.0, 0.0, 0.0),
            Vector3D::new(5.0, 5.0, 0.0),
            Vector3D::new(10.0, 0.0, 0.0),
        ];
        mesh.faces.push(Face::new([0, 1, 2]));

        let mut root = Node::new("root");
        root.mesh_indices.push(0);

        Scene {
            root_node: Some(root),
            meshes: vec![mesh],
            materials: vec![Material::named("MyMaterial")],
            ..Scene::default()
        }
    }

    #[test]
    fn valid_scene_passes() {
        let scene = triangle_scene();
        scene.validate_references().unwrap();
        let root = scene.root_node.as_ref().unwrap();
        assert_eq!(scene.node_meshes(root).count(), 1);
        assert_eq!(
            scene.mesh_material(&scene.meshes[0]).map(|m| m.name()),
            Some("MyMaterial".to_string())
        );
    }

    #[test]
    fn dangling_mesh_index_is_rejected() {
        let mut scene = triangle_scene();
        scene.root_node.as_mut().unwrap().mesh_indices.push(7);
        let err = scene.validate_references().unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
        assert!(err.to_string().contains("mesh 7"));
    }

    #[test]
    fn dangling_material_index_is_rejected() {
        let mut scene = triangle_scene();
        scene.meshes[0].material_index = 1;
        assert!(scene.validate_references().is_err());
    }

    #[test]
    fn out_of_range_face_index_is_rejected() {
        let mut scene = triangle_scene();
        scene.meshes[0].faces.push(Face::new([0, 1, 3]));
        assert!(scene.validate_references().is_err());
    }

    #[test]
    fn short_normal_stream_is_rejected() {
        let mut scene = triangle_scene();
        scene.meshes[0].normals = vec![Vector3D::ZERO];
        let err = scene.validate_references().unwrap_err();
        assert_eq!(
            err.to_string(),
            InteropError::marshal("mesh 0: normals has 1 entries for 3 vertices").to_string()
        );
    }

    #[test]
    fn empty_scene_is_valid() {
        Scene::new().validate_references().unwrap();
    }
}
