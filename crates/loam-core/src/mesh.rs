//! Meshes, faces, and bones.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::error::InteropError;
use crate::limits::{MAX_COLOR_SETS, MAX_FACE_INDICES, MAX_TEXTURE_COORDS};
use crate::math::{Color4D, Matrix4x4, Vector3D};

bitflags! {
    /// Primitive kinds present in a mesh. Values match `aiPrimitiveType`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PrimitiveType: u32 {
        /// Single-index faces.
        const POINT = 0x1;
        /// Two-index faces.
        const LINE = 0x2;
        /// Three-index faces.
        const TRIANGLE = 0x4;
        /// Faces with more than three indices.
        const POLYGON = 0x8;
    }
}

impl PrimitiveType {
    /// Primitive kind implied by a face with `index_count` indices.
    pub fn for_index_count(index_count: usize) -> Self {
        match index_count {
            0 => Self::empty(),
            1 => Self::POINT,
            2 => Self::LINE,
            3 => Self::TRIANGLE,
            _ => Self::POLYGON,
        }
    }
}

/// A single face: indices into the owning mesh's vertex arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    /// Vertex indices, in winding order.
    pub indices: SmallVec<[u32; 4]>,
}

impl Face {
    /// Create a face from its vertex indices.
    pub fn new(indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Influence of a bone on a single vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexWeight {
    /// Index of the influenced vertex.
    pub vertex_id: u32,
    /// Strength of the influence, in `0.0..=1.0`.
    pub weight: f32,
}

impl VertexWeight {
    /// Create a vertex weight.
    pub const fn new(vertex_id: u32, weight: f32) -> Self {
        Self { vertex_id, weight }
    }
}

/// A bone: a named node reference with per-vertex weights.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bone {
    /// Name of the node this bone drives.
    pub name: String,
    /// Vertex weights.
    pub weights: Vec<VertexWeight>,
    /// Mesh space to bone space transform.
    pub offset_matrix: Matrix4x4,
}

/// A mesh: vertex streams, faces, bones, and a material reference by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Mesh name (may be empty).
    pub name: String,
    /// Primitive kinds present in `faces`.
    pub primitive_types: PrimitiveType,
    /// Vertex positions.
    pub vertices: Vec<Vector3D>,
    /// Per-vertex normals; empty or `vertices.len()` long.
    pub normals: Vec<Vector3D>,
    /// Per-vertex tangents; empty or `vertices.len()` long.
    pub tangents: Vec<Vector3D>,
    /// Per-vertex bitangents; empty or `vertices.len()` long.
    pub bitangents: Vec<Vector3D>,
    /// Vertex colour channels; each empty or `vertices.len()` long.
    pub vertex_color_channels: [Vec<Color4D>; MAX_COLOR_SETS],
    /// Texture coordinate channels; each empty or `vertices.len()` long.
    pub texture_coordinate_channels: [Vec<Vector3D>; MAX_TEXTURE_COORDS],
    /// Number of meaningful UV components (1..=3) per texture channel.
    pub uv_component_count: [u32; MAX_TEXTURE_COORDS],
    /// Faces.
    pub faces: Vec<Face>,
    /// Bones.
    pub bones: Vec<Bone>,
    /// Index into [`Scene::materials`](crate::Scene::materials).
    pub material_index: usize,
}

impl Mesh {
    /// Create an empty mesh with a name and primitive kind.
    pub fn new(name: impl Into<String>, primitive_types: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            primitive_types,
            ..Self::default()
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh carries normals.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Whether the mesh carries tangents and bitangents.
    pub fn has_tangent_basis(&self) -> bool {
        !self.tangents.is_empty() && !self.bitangents.is_empty()
    }

    /// Whether the mesh carries bones.
    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Whether texture channel `channel` is populated.
    pub fn has_texture_coords(&self, channel: usize) -> bool {
        self.texture_coordinate_channels
            .get(channel)
            .is_some_and(|c| !c.is_empty())
    }

    /// Whether colour channel `channel` is populated.
    pub fn has_vertex_colors(&self, channel: usize) -> bool {
        self.vertex_color_channels
            .get(channel)
            .is_some_and(|c| !c.is_empty())
    }

    /// All face indices, flattened in face order.
    pub fn indices(&self) -> Vec<u32> {
        self.faces
            .iter()
            .flat_map(|f| f.indices.iter().copied())
            .collect()
    }

    /// Recompute [`Mesh::primitive_types`] from the faces.
    pub fn update_primitive_types(&mut self) {
        self.primitive_types = self
            .faces
            .iter()
            .map(|f| PrimitiveType::for_index_count(f.index_count()))
            .fold(PrimitiveType::empty(), |acc, p| acc | p);
    }

    /// Check that every per-vertex stream is empty or one entry per vertex,
    /// and that faces and bone weights only name existing vertices.
    ///
    /// Fails with [`InteropError::MarshalFailure`].
    pub fn validate(&self) -> Result<(), InteropError> {
        match self.stream_problem() {
            Some(problem) => Err(InteropError::marshal(format!(
                "mesh '{}': {problem}",
                self.name
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn stream_problem(&self) -> Option<String> {
        let n = self.vertex_count();
        let stream_ok = |len: usize| len == 0 || len == n;

        let named_streams = [
            ("normals", self.normals.len()),
            ("tangents", self.tangents.len()),
            ("bitangents", self.bitangents.len()),
        ];
        for (what, len) in named_streams {
            if !stream_ok(len) {
                return Some(format!("{what} has {len} entries for {n} vertices"));
            }
        }
        for (ch, colors) in self.vertex_color_channels.iter().enumerate() {
            if !stream_ok(colors.len()) {
                return Some(format!(
                    "colour channel {ch} has {} entries for {n} vertices",
                    colors.len()
                ));
            }
        }
        for (ch, uvs) in self.texture_coordinate_channels.iter().enumerate() {
            if !stream_ok(uvs.len()) {
                return Some(format!(
                    "texture channel {ch} has {} entries for {n} vertices",
                    uvs.len()
                ));
            }
        }

        for (fi, face) in self.faces.iter().enumerate() {
            if face.index_count() > MAX_FACE_INDICES {
                return Some(format!(
                    "face {fi} has {} indices (max {MAX_FACE_INDICES})",
                    face.index_count()
                ));
            }
            if let Some(&i) = face.indices.iter().find(|&&i| i as usize >= n) {
                return Some(format!(
                    "face {fi} references vertex {i} but the mesh has {n} vertices"
                ));
            }
        }

        for bone in &self.bones {
            if let Some(w) = bone.weights.iter().find(|w| w.vertex_id as usize >= n) {
                return Some(format!(
                    "bone '{}' weights vertex {} but the mesh has {n} vertices",
                    bone.name, w.vertex_id
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new("tri", PrimitiveType::TRIANGLE);
        mesh.vertices = vec![
            Vector3D::new(1.0, 0.0, 0.0),
            Vector3D::new(5.0, 5.0, 0.0),
            Vector3D::new(10.0, 0.0, 0.0),
        ];
        mesh.faces.push(Face::new([0, 1, 2]));
        mesh
    }

    #[test]
    fn counts_and_indices() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.indices(), vec![0, 1, 2]);
        assert!(!mesh.has_normals());
        assert!(!mesh.has_texture_coords(0));
        assert!(!mesh.has_texture_coords(99));
    }

    #[test]
    fn primitive_types_follow_faces() {
        let mut mesh = triangle();
        mesh.faces.push(Face::new([0, 1]));
        mesh.faces.push(Face::new([0, 1, 2, 0]));
        mesh.update_primitive_types();
        assert_eq!(
            mesh.primitive_types,
            PrimitiveType::TRIANGLE | PrimitiveType::LINE | PrimitiveType::POLYGON
        );
    }

    #[test]
    fn mismatched_streams_fail_validation() {
        let mut mesh = triangle();
        mesh.validate().unwrap();

        mesh.texture_coordinate_channels[2] = vec![Vector3D::ZERO; 2];
        let err = mesh.validate().unwrap_err();
        assert!(err.to_string().contains("texture channel 2 has 2 entries"), "{err}");

        let mut mesh = triangle();
        mesh.bones.push(Bone {
            name: "b".into(),
            weights: vec![VertexWeight::new(3, 1.0)],
            offset_matrix: Matrix4x4::IDENTITY,
        });
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn default_bone_offset_is_identity() {
        assert!(Bone::default().offset_matrix.is_identity());
    }
}
