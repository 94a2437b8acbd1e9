//! `#[repr(C)]` mirrors of the Assimp 4.1 structs.
//!
//! Field order and sizes follow the 4.1 headers on 64-bit targets; the
//! expected sizes are asserted at compile time at the bottom of this file.
//! Blittable math types derive [`bytemuck::Pod`] and are copied as bytes;
//! everything holding a pointer or an [`AiString`] is transcoded by the
//! contracts in [`crate::marshal`].

use std::ffi::{c_char, c_void};
use std::fmt;

use bytemuck::{Pod, Zeroable};
use loam_core::limits::MAX_STRING_LENGTH;
use loam_core::{
    Color3D, Color4D, InteropError, Matrix4x4, Quaternion, QuaternionKey, Texel, Vector2D,
    Vector3D, VertexWeight,
};

/// `aiString`: length-prefixed, NUL-terminated, fixed 1024-byte buffer.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AiString {
    /// Byte length, excluding the terminator.
    pub length: u32,
    /// UTF-8 bytes followed by a NUL.
    pub data: [u8; MAX_STRING_LENGTH],
}

impl AiString {
    /// The empty string.
    pub const EMPTY: Self = Self {
        length: 0,
        data: [0; MAX_STRING_LENGTH],
    };

    /// Encode `s`. Fails if it does not fit in 1023 bytes.
    pub fn new(s: &str) -> Result<Self, InteropError> {
        let bytes = s.as_bytes();
        if bytes.len() >= MAX_STRING_LENGTH {
            return Err(InteropError::marshal(format!(
                "string of {} bytes exceeds the native limit of {} bytes",
                bytes.len(),
                MAX_STRING_LENGTH - 1
            )));
        }
        let mut out = Self::EMPTY;
        out.length = bytes.len() as u32;
        out.data[..bytes.len()].copy_from_slice(bytes);
        Ok(out)
    }

    /// Decode into an owned string. Invalid UTF-8 is replaced.
    pub fn to_string_lossy(&self) -> Result<String, InteropError> {
        let len = self.length as usize;
        if len >= MAX_STRING_LENGTH {
            return Err(InteropError::marshal(format!(
                "native string length {len} exceeds buffer"
            )));
        }
        Ok(String::from_utf8_lossy(&self.data[..len]).into_owned())
    }
}

impl Default for AiString {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for AiString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = (self.length as usize).min(MAX_STRING_LENGTH);
        write!(f, "AiString({:?})", String::from_utf8_lossy(&self.data[..len]))
    }
}

/// `aiVector2D`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiVector2D {
    /// X.
    pub x: f32,
    /// Y.
    pub y: f32,
}

/// `aiVector3D`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiVector3D {
    /// X.
    pub x: f32,
    /// Y.
    pub y: f32,
    /// Z.
    pub z: f32,
}

/// `aiColor3D`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiColor3D {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

/// `aiColor4D`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiColor4D {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

/// `aiQuaternion`, `w` first.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiQuaternion {
    /// Scalar part.
    pub w: f32,
    /// X.
    pub x: f32,
    /// Y.
    pub y: f32,
    /// Z.
    pub z: f32,
}

/// `aiMatrix4x4`, row-major. Rows are lettered `a..d`, columns numbered
/// `1..4`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[allow(missing_docs)]
pub struct AiMatrix4x4 {
    pub a1: f32,
    pub a2: f32,
    pub a3: f32,
    pub a4: f32,
    pub b1: f32,
    pub b2: f32,
    pub b3: f32,
    pub b4: f32,
    pub c1: f32,
    pub c2: f32,
    pub c3: f32,
    pub c4: f32,
    pub d1: f32,
    pub d2: f32,
    pub d3: f32,
    pub d4: f32,
}

/// `aiTexel`, BGRA byte order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AiTexel {
    /// Blue.
    pub b: u8,
    /// Green.
    pub g: u8,
    /// Red.
    pub r: u8,
    /// Alpha.
    pub a: u8,
}

/// `aiFace`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiFace {
    /// Number of entries in `indices`.
    pub num_indices: u32,
    /// Vertex indices.
    pub indices: *mut u32,
}

/// `aiVertexWeight`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiVertexWeight {
    /// Influenced vertex.
    pub vertex_id: u32,
    /// Influence strength.
    pub weight: f32,
}

/// `aiBone`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiBone {
    /// Name of the driven node.
    pub name: AiString,
    /// Number of entries in `weights`.
    pub num_weights: u32,
    /// Vertex weights.
    pub weights: *mut AiVertexWeight,
    /// Mesh space to bone space.
    pub offset_matrix: AiMatrix4x4,
}

/// `aiMesh`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiMesh {
    /// `aiPrimitiveType` bits.
    pub primitive_types: u32,
    /// Vertex count for every per-vertex stream.
    pub num_vertices: u32,
    /// Number of entries in `faces`.
    pub num_faces: u32,
    /// Positions.
    pub vertices: *mut AiVector3D,
    /// Normals, or null.
    pub normals: *mut AiVector3D,
    /// Tangents, or null.
    pub tangents: *mut AiVector3D,
    /// Bitangents, or null.
    pub bitangents: *mut AiVector3D,
    /// Colour channels; null entries are absent.
    pub colors: [*mut AiColor4D; 8],
    /// Texture coordinate channels; null entries are absent.
    pub texture_coords: [*mut AiVector3D; 8],
    /// UV component count per texture channel.
    pub num_uv_components: [u32; 8],
    /// Faces.
    pub faces: *mut AiFace,
    /// Number of entries in `bones`.
    pub num_bones: u32,
    /// Bone pointers.
    pub bones: *mut *mut AiBone,
    /// Index into the scene's materials.
    pub material_index: u32,
    /// Mesh name.
    pub name: AiString,
    /// Number of morph targets (always 0 on export).
    pub num_anim_meshes: u32,
    /// Morph targets (always null on export).
    pub anim_meshes: *mut *mut c_void,
    /// Morphing method.
    pub method: u32,
}

/// `aiMaterialProperty`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiMaterialProperty {
    /// Property key.
    pub key: AiString,
    /// Texture semantic.
    pub semantic: u32,
    /// Texture slot.
    pub index: u32,
    /// Byte length of `data`.
    pub data_length: u32,
    /// `aiPropertyTypeInfo`.
    pub property_type: i32,
    /// Raw bytes.
    pub data: *mut c_char,
}

/// `aiMaterial`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiMaterial {
    /// Property pointers.
    pub properties: *mut *mut AiMaterialProperty,
    /// Number of entries in `properties`.
    pub num_properties: u32,
    /// Capacity of `properties`.
    pub num_allocated: u32,
}

/// `aiNode`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiNode {
    /// Node name.
    pub name: AiString,
    /// Transform relative to the parent.
    pub transformation: AiMatrix4x4,
    /// Parent node, null for the root.
    pub parent: *mut AiNode,
    /// Number of entries in `children`.
    pub num_children: u32,
    /// Child pointers.
    pub children: *mut *mut AiNode,
    /// Number of entries in `meshes`.
    pub num_meshes: u32,
    /// Indices into the scene's meshes.
    pub meshes: *mut u32,
    /// Metadata (always null on export).
    pub meta_data: *mut c_void,
}

/// `aiCamera`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiCamera {
    /// Node name.
    pub name: AiString,
    /// Position.
    pub position: AiVector3D,
    /// Up vector.
    pub up: AiVector3D,
    /// Viewing direction.
    pub look_at: AiVector3D,
    /// Half horizontal field of view.
    pub horizontal_fov: f32,
    /// Near clip distance.
    pub clip_plane_near: f32,
    /// Far clip distance.
    pub clip_plane_far: f32,
    /// Aspect ratio.
    pub aspect: f32,
}

/// `aiLight`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiLight {
    /// Node name.
    pub name: AiString,
    /// `aiLightSourceType`.
    pub light_type: u32,
    /// Position.
    pub position: AiVector3D,
    /// Direction.
    pub direction: AiVector3D,
    /// Up vector.
    pub up: AiVector3D,
    /// Constant attenuation.
    pub attenuation_constant: f32,
    /// Linear attenuation.
    pub attenuation_linear: f32,
    /// Quadratic attenuation.
    pub attenuation_quadratic: f32,
    /// Diffuse colour.
    pub color_diffuse: AiColor3D,
    /// Specular colour.
    pub color_specular: AiColor3D,
    /// Ambient colour.
    pub color_ambient: AiColor3D,
    /// Inner cone angle.
    pub angle_inner_cone: f32,
    /// Outer cone angle.
    pub angle_outer_cone: f32,
    /// Area light extent.
    pub size: AiVector2D,
}

/// `aiVectorKey`. Four bytes of tail padding, so not blittable.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AiVectorKey {
    /// Key time.
    pub time: f64,
    /// Key value.
    pub value: AiVector3D,
}

/// `aiQuatKey`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AiQuatKey {
    /// Key time.
    pub time: f64,
    /// Key value.
    pub value: AiQuaternion,
}

/// `aiNodeAnim`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiNodeAnim {
    /// Animated node name.
    pub node_name: AiString,
    /// Number of entries in `position_keys`.
    pub num_position_keys: u32,
    /// Position keys.
    pub position_keys: *mut AiVectorKey,
    /// Number of entries in `rotation_keys`.
    pub num_rotation_keys: u32,
    /// Rotation keys.
    pub rotation_keys: *mut AiQuatKey,
    /// Number of entries in `scaling_keys`.
    pub num_scaling_keys: u32,
    /// Scaling keys.
    pub scaling_keys: *mut AiVectorKey,
    /// `aiAnimBehaviour` before the first key.
    pub pre_state: u32,
    /// `aiAnimBehaviour` after the last key.
    pub post_state: u32,
}

/// `aiAnimation`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiAnimation {
    /// Clip name.
    pub name: AiString,
    /// Duration in ticks.
    pub duration: f64,
    /// Ticks per second.
    pub ticks_per_second: f64,
    /// Number of entries in `channels`.
    pub num_channels: u32,
    /// Node channel pointers.
    pub channels: *mut *mut AiNodeAnim,
    /// Mesh channel count (always 0 on export).
    pub num_mesh_channels: u32,
    /// Mesh channels (always null on export).
    pub mesh_channels: *mut *mut c_void,
    /// Morph channel count (always 0 on export).
    pub num_morph_mesh_channels: u32,
    /// Morph channels (always null on export).
    pub morph_mesh_channels: *mut *mut c_void,
}

/// `aiTexture`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiTexture {
    /// Width in texels, or byte length when `height` is 0.
    pub width: u32,
    /// Height in texels; 0 marks a compressed texture.
    pub height: u32,
    /// NUL-terminated format hint (`png`, `jpg`, ...).
    pub format_hint: [u8; 4],
    /// Texels, or the encoded file bytes.
    pub data: *mut AiTexel,
}

/// `aiScene`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiScene {
    /// `AI_SCENE_FLAGS_*`.
    pub flags: u32,
    /// Root of the node tree.
    pub root_node: *mut AiNode,
    /// Number of entries in `meshes`.
    pub num_meshes: u32,
    /// Mesh pointers.
    pub meshes: *mut *mut AiMesh,
    /// Number of entries in `materials`.
    pub num_materials: u32,
    /// Material pointers.
    pub materials: *mut *mut AiMaterial,
    /// Number of entries in `animations`.
    pub num_animations: u32,
    /// Animation pointers.
    pub animations: *mut *mut AiAnimation,
    /// Number of entries in `textures`.
    pub num_textures: u32,
    /// Texture pointers.
    pub textures: *mut *mut AiTexture,
    /// Number of entries in `lights`.
    pub num_lights: u32,
    /// Light pointers.
    pub lights: *mut *mut AiLight,
    /// Number of entries in `cameras`.
    pub num_cameras: u32,
    /// Camera pointers.
    pub cameras: *mut *mut AiCamera,
    /// Library-internal data; null for scenes built on this side.
    pub private: *mut c_char,
}

/// `aiExportDataBlob`: one node of the export output chain.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiExportDataBlob {
    /// Byte length of `data`.
    pub size: usize,
    /// File bytes.
    pub data: *mut c_void,
    /// Blob name (empty for the primary file).
    pub name: AiString,
    /// Next blob, or null.
    pub next: *mut AiExportDataBlob,
}

/// Native log callback: `(message, user)`.
pub type AiLogStreamCallback = extern "C" fn(message: *const c_char, user: *mut c_char);

/// `aiLogStream`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiLogStream {
    /// Callback invoked per message.
    pub callback: Option<AiLogStreamCallback>,
    /// Opaque pointer passed back to `callback`.
    pub user: *mut c_char,
}

/// `aiExportFormatDesc`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiExportFormatDesc {
    /// Format identifier passed to the export entry points.
    pub id: *const c_char,
    /// Human-readable description.
    pub description: *const c_char,
    /// File extension, without the dot.
    pub file_extension: *const c_char,
}

impl From<Vector2D> for AiVector2D {
    fn from(v: Vector2D) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<AiVector2D> for Vector2D {
    fn from(v: AiVector2D) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<Vector3D> for AiVector3D {
    fn from(v: Vector3D) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<AiVector3D> for Vector3D {
    fn from(v: AiVector3D) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Color3D> for AiColor3D {
    fn from(c: Color3D) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    }
}

impl From<AiColor3D> for Color3D {
    fn from(c: AiColor3D) -> Self {
        Self::new(c.r, c.g, c.b)
    }
}

impl From<Color4D> for AiColor4D {
    fn from(c: Color4D) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

impl From<AiColor4D> for Color4D {
    fn from(c: AiColor4D) -> Self {
        Self::new(c.r, c.g, c.b, c.a)
    }
}

impl From<Quaternion> for AiQuaternion {
    fn from(q: Quaternion) -> Self {
        Self {
            w: q.w,
            x: q.x,
            y: q.y,
            z: q.z,
        }
    }
}

impl From<AiQuaternion> for Quaternion {
    fn from(q: AiQuaternion) -> Self {
        Self::new(q.w, q.x, q.y, q.z)
    }
}

// The only place the one-based `a1..d4` naming meets zero-based indexing.
impl From<Matrix4x4> for AiMatrix4x4 {
    fn from(m: Matrix4x4) -> Self {
        let [a, b, c, d] = *m.rows();
        Self {
            a1: a[0],
            a2: a[1],
            a3: a[2],
            a4: a[3],
            b1: b[0],
            b2: b[1],
            b3: b[2],
            b4: b[3],
            c1: c[0],
            c2: c[1],
            c3: c[2],
            c4: c[3],
            d1: d[0],
            d2: d[1],
            d3: d[2],
            d4: d[3],
        }
    }
}

impl From<AiMatrix4x4> for Matrix4x4 {
    fn from(m: AiMatrix4x4) -> Self {
        Self::from_rows([
            [m.a1, m.a2, m.a3, m.a4],
            [m.b1, m.b2, m.b3, m.b4],
            [m.c1, m.c2, m.c3, m.c4],
            [m.d1, m.d2, m.d3, m.d4],
        ])
    }
}

impl From<Texel> for AiTexel {
    fn from(t: Texel) -> Self {
        Self {
            b: t.b,
            g: t.g,
            r: t.r,
            a: t.a,
        }
    }
}

impl From<AiTexel> for Texel {
    fn from(t: AiTexel) -> Self {
        Self {
            b: t.b,
            g: t.g,
            r: t.r,
            a: t.a,
        }
    }
}

impl From<VertexWeight> for AiVertexWeight {
    fn from(w: VertexWeight) -> Self {
        Self {
            vertex_id: w.vertex_id,
            weight: w.weight,
        }
    }
}

impl From<AiVertexWeight> for VertexWeight {
    fn from(w: AiVertexWeight) -> Self {
        Self::new(w.vertex_id, w.weight)
    }
}

impl From<QuaternionKey> for AiQuatKey {
    fn from(k: QuaternionKey) -> Self {
        Self {
            time: k.time,
            value: k.value.into(),
        }
    }
}

impl From<AiQuatKey> for QuaternionKey {
    fn from(k: AiQuatKey) -> Self {
        Self::new(k.time, k.value.into())
    }
}

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::*;
    use std::mem::size_of;

    const _: () = assert!(size_of::<AiString>() == 1028);
    const _: () = assert!(size_of::<AiVector2D>() == 8);
    const _: () = assert!(size_of::<AiVector3D>() == 12);
    const _: () = assert!(size_of::<AiColor3D>() == 12);
    const _: () = assert!(size_of::<AiColor4D>() == 16);
    const _: () = assert!(size_of::<AiQuaternion>() == 16);
    const _: () = assert!(size_of::<AiMatrix4x4>() == 64);
    const _: () = assert!(size_of::<AiTexel>() == 4);
    const _: () = assert!(size_of::<AiFace>() == 16);
    const _: () = assert!(size_of::<AiVertexWeight>() == 8);
    const _: () = assert!(size_of::<AiBone>() == 1104);
    const _: () = assert!(size_of::<AiMesh>() == 1288);
    const _: () = assert!(size_of::<AiMaterialProperty>() == 1056);
    const _: () = assert!(size_of::<AiMaterial>() == 16);
    const _: () = assert!(size_of::<AiNode>() == 1144);
    const _: () = assert!(size_of::<AiCamera>() == 1080);
    const _: () = assert!(size_of::<AiLight>() == 1132);
    const _: () = assert!(size_of::<AiVectorKey>() == 24);
    const _: () = assert!(size_of::<AiQuatKey>() == 24);
    const _: () = assert!(size_of::<AiNodeAnim>() == 1080);
    const _: () = assert!(size_of::<AiAnimation>() == 1096);
    const _: () = assert!(size_of::<AiTexture>() == 24);
    const _: () = assert!(size_of::<AiScene>() == 120);
    const _: () = assert!(size_of::<AiExportDataBlob>() == 1056);
    const _: () = assert!(size_of::<AiLogStream>() == 16);
    const _: () = assert!(size_of::<AiExportFormatDesc>() == 24);
}
