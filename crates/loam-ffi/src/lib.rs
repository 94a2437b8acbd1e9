//! Native boundary for the Loam Assimp bindings.
//!
//! This crate owns everything that touches the C ABI: the `#[repr(C)]`
//! struct layouts, the per-entity [`Marshal`] contracts that move managed
//! values in and out of them, the scene graph marshaler, the
//! reference-counted [`NativeLibrary`] handle, and the
//! [`LogStreamRegistry`]. It is one of two crates that may contain `unsafe`
//! code (along with `loam-arena`); every `unsafe` item carries an explicit
//! `#[allow(unsafe_code)]` and a `// SAFETY:` comment.
//!
//! # Ownership
//!
//! Memory written by `to_native` lives in a caller-supplied
//! [`NativeArena`](loam_arena::NativeArena). Memory returned by the native
//! library (imported scenes, export blobs) is never freed by an arena; it
//! goes back through the library's own release entry points.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod animation;
pub mod api;
pub mod blob;
pub mod camera;
pub mod dynamic;
pub mod layout;
pub mod library;
pub mod light;
pub mod logstream;
pub mod marshal;
pub mod material;
pub mod mesh;
pub mod node;
pub mod scene;
pub mod status;
pub mod texture;
pub mod transfer;
pub mod types;

pub use api::{ExportFormatDescription, NativeApi};
pub use library::{CallPolicy, FreedSubscription, LibraryConfig, LibraryLease, NativeLibrary};
pub use logstream::{LogStream, LogStreamRegistry};
pub use marshal::Marshal;
pub use scene::{export_scene, free_scene, import_scene, NativeScene};
pub use status::AiReturn;
