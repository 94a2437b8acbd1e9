//! Loam: managed scene data in and out of the Assimp native library.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Loam sub-crates. For most users, adding `loam` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use loam::prelude::*;
//!
//! let importer = Importer::new()?
//!     .with_post_process(PostProcessSteps::TARGET_REALTIME_QUALITY);
//! let scene = importer.import_file("model.fbx")?;
//! println!("{} meshes, {} materials", scene.meshes.len(), scene.materials.len());
//!
//! if importer.is_export_format_supported("obj")? {
//!     importer.export_file(&scene, "model.obj", "obj")?;
//! }
//! # Ok::<(), InteropError>(())
//! ```
//!
//! The library file is taken from `LOAM_ASSIMP_PATH` if set; otherwise the
//! platform's usual names are tried in `LOAM_ASSIMP_DIR` and then on the
//! loader's search path. Every [`Importer`](importer::Importer) holds one reference
//! to it; the last one dropped frees it.
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `loam-core` | Managed scene model and `InteropError` |
//! | [`arena`] | `loam-arena` | Native memory arena and struct layout descriptors |
//! | [`ffi`] | `loam-ffi` | `#[repr(C)]` mirrors, marshaling, library handle, log streams |
//! | [`importer`] | (this crate) | The `Importer` session |
//! | [`postprocess`] | (this crate) | `PostProcessSteps` flags |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Managed scene model (`loam-core`).
///
/// [`types::Scene`] and everything it owns, the math types, and the
/// crate-wide [`types::InteropError`].
pub use loam_core as types;

/// Native memory arena (`loam-arena`).
///
/// [`arena::NativeArena`] tracks every block handed to native code, and
/// [`arena::describe`] gives the byte layout of a `#[repr(C)]` type.
pub use loam_arena as arena;

/// Native interop (`loam-ffi`).
///
/// The [`ffi::NativeLibrary`] handle, the [`ffi::Marshal`] contracts,
/// [`ffi::NativeScene`], and the [`ffi::LogStreamRegistry`].
pub use loam_ffi as ffi;

pub mod importer;
pub mod postprocess;

/// Common imports for typical Loam usage.
///
/// ```rust
/// use loam::prelude::*;
/// ```
pub mod prelude {
    // Sessions
    pub use crate::importer::Importer;
    pub use crate::postprocess::PostProcessSteps;

    // Scene model
    pub use loam_core::{
        Animation, Camera, Color4D, EmbeddedTexture, ExportDataBlob, Face, Light, Material,
        Matrix4x4, Mesh, Node, PrimitiveType, Scene, TextureType, Vector3D,
    };

    // Errors
    pub use loam_core::InteropError;

    // Library and logging
    pub use loam_ffi::{LogStream, LogStreamRegistry, NativeLibrary};
}
