//! Whole-scene import and export through a [`NativeApi`].
//!
//! These are the only places a library-owned scene or blob is read. Each
//! one is copied into managed values and handed straight back to the
//! library's release entry point, so nothing the library allocated
//! outlives the call.

use std::ffi::CString;
use std::path::Path;

use loam_core::{ExportDataBlob, InteropError, Scene};

use crate::api::NativeApi;
use crate::marshal::Marshal;
use crate::scene::{import_scene, NativeScene};
use crate::status::AiReturn;

fn c_string(what: &str, value: &str) -> Result<CString, InteropError> {
    CString::new(value).map_err(|_| InteropError::marshal(format!("{what} contains a NUL byte")))
}

fn c_path(path: &Path) -> Result<CString, InteropError> {
    let text = path
        .to_str()
        .ok_or_else(|| InteropError::marshal(format!("path {} is not UTF-8", path.display())))?;
    c_string("path", text)
}

fn require_export_format(api: &dyn NativeApi, format_id: &str) -> Result<CString, InteropError> {
    if !api.supports_export_format(format_id) {
        return Err(InteropError::UnsupportedFormat {
            format_id: format_id.to_string(),
        });
    }
    c_string("format id", format_id)
}

#[allow(unsafe_code)]
fn take_scene(
    api: &dyn NativeApi,
    native: *const crate::types::AiScene,
) -> Result<Scene, InteropError> {
    if native.is_null() {
        return Err(InteropError::ImportFailed {
            reason: api.error_string(),
        });
    }
    // SAFETY: non-null scene returned by `api`, released right below.
    let scene = unsafe { import_scene(native) };
    // SAFETY: `native` came from `api` and is not used again.
    unsafe { api.release_import(native) };
    scene
}

/// Import the file at `path`.
pub fn import_file(api: &dyn NativeApi, path: &Path, flags: u32) -> Result<Scene, InteropError> {
    let cpath = c_path(path)?;
    let scene = take_scene(api, api.import_file(&cpath, flags))?;
    log::debug!(
        "imported {}: {} meshes, {} materials",
        path.display(),
        scene.meshes.len(),
        scene.materials.len()
    );
    Ok(scene)
}

/// Import a file held in memory. `hint` is its extension, or empty to let
/// the library guess.
pub fn import_memory(
    api: &dyn NativeApi,
    data: &[u8],
    flags: u32,
    hint: &str,
) -> Result<Scene, InteropError> {
    let chint = c_string("format hint", hint.trim_start_matches('.'))?;
    take_scene(api, api.import_memory(data, flags, &chint))
}

/// Export `scene` to `path` in `format_id`.
///
/// The format is checked before anything is marshaled.
#[allow(unsafe_code)]
pub fn export_file(
    api: &dyn NativeApi,
    scene: &Scene,
    format_id: &str,
    path: &Path,
    flags: u32,
) -> Result<(), InteropError> {
    let cformat = require_export_format(api, format_id)?;
    let cpath = c_path(path)?;
    let native = NativeScene::export(scene)?;
    // SAFETY: `native` holds a complete scene for the duration of the call.
    let status = unsafe { api.export_scene(native.as_ptr(), &cformat, &cpath, flags) };
    match status {
        AiReturn::Success => {
            log::debug!("exported {} as {format_id}", path.display());
            Ok(())
        }
        _ => Err(InteropError::ExportFailed {
            reason: api.error_string(),
        }),
    }
}

/// Export `scene` to an in-memory blob chain in `format_id`.
#[allow(unsafe_code)]
pub fn export_blob(
    api: &dyn NativeApi,
    scene: &Scene,
    format_id: &str,
    flags: u32,
) -> Result<ExportDataBlob, InteropError> {
    let cformat = require_export_format(api, format_id)?;
    let native = NativeScene::export(scene)?;
    // SAFETY: as in `export_file`.
    let blob = unsafe { api.export_scene_to_blob(native.as_ptr(), &cformat, flags) };
    if blob.is_null() {
        return Err(InteropError::ExportFailed {
            reason: api.error_string(),
        });
    }
    // SAFETY: non-null chain returned by `api`, released right below.
    let chain = unsafe { ExportDataBlob::from_native(&*blob) };
    // SAFETY: `blob` came from `api` and is not used again.
    unsafe { api.release_export_blob(blob) };
    let chain = chain?;
    log::debug!(
        "exported {format_id} blob chain of {} ({} bytes in head)",
        chain.chain_len(),
        chain.data.len()
    );
    Ok(chain)
}
