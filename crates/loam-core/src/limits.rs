//! Limits and well-known names shared with the native library.

/// Maximum byte length of a native string, including the terminating NUL.
pub const MAX_STRING_LENGTH: usize = 1024;

/// Maximum number of indices a single face may reference.
pub const MAX_FACE_INDICES: usize = 0x7fff;

/// Number of vertex colour channels a mesh can carry.
pub const MAX_COLOR_SETS: usize = 8;

/// Number of texture coordinate channels a mesh can carry.
pub const MAX_TEXTURE_COORDS: usize = 8;

/// Name the native importers give the material they synthesise when a
/// file defines none (or in addition to the file's own materials).
pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";

/// Name of the synthesised material for meshes with UV coordinates.
pub const DEFAULT_TEXTURED_MATERIAL_NAME: &str = "TexturedDefaultMaterial";
