//! Native memory arena and struct layout descriptors.
//!
//! Everything the marshaling layer writes for the native library lives in
//! blocks handed out by a [`NativeArena`]. The arena tracks every block it
//! owns, frees each exactly once, and refuses to touch memory it did not
//! allocate. This crate is one of two that may contain `unsafe` code (along
//! with `loam-ffi`); the primitives live in `raw.rs`.
//!
//! # Architecture
//!
//! ```text
//! NativeArena
//! ├── ArenaConfig (alignment, optional byte budget)
//! ├── allocation table: address → (Layout, generation)
//! └── NativeHandle (address + length + generation + origin)
//!
//! NativeLayout (per native struct)
//! └── describe::<T>() → &'static StructLayout (cached per TypeId)
//! ```
//!
//! # Ownership domains
//!
//! A handle is either arena-owned or foreign. Foreign handles wrap memory
//! owned by someone else (usually the native library) and can only be
//! built through the `unsafe` [`NativeHandle::from_raw`]. Freeing a foreign
//! handle, or an address the arena never handed out, is a no-op.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
mod raw;

pub use arena::NativeArena;
pub use config::ArenaConfig;
pub use descriptor::{describe, FieldLayout, NativeLayout, StructLayout};
pub use error::ArenaError;
pub use handle::{HandleOrigin, NativeHandle};
