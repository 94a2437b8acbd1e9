//! Managed scene model and error types for the Loam interop layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! scene graph that the marshaling layer in `loam-ffi` moves across the
//! native boundary: math value types, meshes, nodes, materials, cameras,
//! lights, animations, embedded textures, export blobs, and the shared
//! [`InteropError`] taxonomy.
//!
//! Nothing in this crate knows about native memory. Every type here owns
//! its data with ordinary Rust ownership.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod animation;
pub mod blob;
pub mod camera;
pub mod error;
pub mod light;
pub mod limits;
pub mod material;
pub mod math;
pub mod mesh;
pub mod node;
pub mod scene;
pub mod texture;

pub use animation::{Animation, AnimationBehaviour, NodeAnimationChannel, QuaternionKey, VectorKey};
pub use blob::ExportDataBlob;
pub use camera::Camera;
pub use error::InteropError;
pub use light::{Light, LightSourceType};
pub use material::{Material, MaterialProperty, PropertyType, TextureType};
pub use math::{Color3D, Color4D, Matrix4x4, Quaternion, Vector2D, Vector3D};
pub use mesh::{Bone, Face, Mesh, PrimitiveType, VertexWeight};
pub use node::Node;
pub use scene::{Scene, SceneFlags};
pub use texture::{EmbeddedTexture, Texel};
