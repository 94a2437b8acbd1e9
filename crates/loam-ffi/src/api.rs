//! The native entry points, as a trait.
//!
//! [`NativeLibrary`](crate::NativeLibrary) never calls C symbols directly;
//! it goes through a [`NativeApi`]. The production implementation binds the
//! Assimp shared library ([`DynamicApi`](crate::dynamic::DynamicApi)); tests
//! substitute an in-process mock with its own memory domain.

use std::ffi::CStr;

use crate::status::AiReturn;
use crate::types::{AiExportDataBlob, AiLogStream, AiScene};

/// One export format offered by the native library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFormatDescription {
    /// Identifier passed to the export entry points (e.g. `obj`).
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// File extension, without the dot.
    pub file_extension: String,
}

/// The subset of the Assimp C API this crate uses.
///
/// Pointers returned by the import and blob entry points are owned by the
/// implementation and must go back through [`NativeApi::release_import`]
/// or [`NativeApi::release_export_blob`], never through an arena.
pub trait NativeApi: Send + Sync {
    /// `aiImportFile`. Null on failure; see [`NativeApi::error_string`].
    fn import_file(&self, path: &CStr, flags: u32) -> *const AiScene;

    /// `aiImportFileFromMemory`. `hint` is a file extension.
    fn import_memory(&self, data: &[u8], flags: u32, hint: &CStr) -> *const AiScene;

    /// `aiReleaseImport`.
    ///
    /// # Safety
    ///
    /// `scene` must be null or a pointer returned by this implementation's
    /// import entry points that has not been released.
    #[allow(unsafe_code)]
    unsafe fn release_import(&self, scene: *const AiScene);

    /// `aiExportScene`.
    ///
    /// # Safety
    ///
    /// `scene` must point to a valid, fully initialised scene.
    #[allow(unsafe_code)]
    unsafe fn export_scene(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        path: &CStr,
        flags: u32,
    ) -> AiReturn;

    /// `aiExportSceneToBlob`. Null on failure.
    ///
    /// # Safety
    ///
    /// As for [`NativeApi::export_scene`].
    #[allow(unsafe_code)]
    unsafe fn export_scene_to_blob(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        flags: u32,
    ) -> *const AiExportDataBlob;

    /// `aiReleaseExportBlob`.
    ///
    /// # Safety
    ///
    /// `blob` must be null or an unreleased pointer returned by
    /// [`NativeApi::export_scene_to_blob`].
    #[allow(unsafe_code)]
    unsafe fn release_export_blob(&self, blob: *const AiExportDataBlob);

    /// `aiAttachLogStream`.
    ///
    /// # Safety
    ///
    /// `stream` must stay valid, and its user pointer usable by its
    /// callback, until it is detached.
    #[allow(unsafe_code)]
    unsafe fn attach_log_stream(&self, stream: *const AiLogStream);

    /// `aiDetachLogStream`. Fails if the stream was not attached.
    ///
    /// # Safety
    ///
    /// `stream` must point to a valid `AiLogStream`.
    #[allow(unsafe_code)]
    unsafe fn detach_log_stream(&self, stream: *const AiLogStream) -> AiReturn;

    /// `aiEnableVerboseLogging`.
    fn enable_verbose_logging(&self, enabled: bool);

    /// `aiGetErrorString`: the message of the last failed call.
    fn error_string(&self) -> String;

    /// `aiGetExportFormatCount` + `aiGetExportFormatDescription`.
    fn export_formats(&self) -> Vec<ExportFormatDescription>;

    /// `aiGetExtensionList`: `*.ext` patterns separated by `;`.
    fn import_extensions(&self) -> String;

    /// Size of a native struct as the library reports it, if it can.
    ///
    /// Assimp has no such entry point, so the default is `None` and layout
    /// verification trusts the compiled declarations.
    fn struct_size(&self, _name: &str) -> Option<usize> {
        None
    }

    /// Whether `format_id` is one of [`NativeApi::export_formats`].
    fn supports_export_format(&self, format_id: &str) -> bool {
        self.export_formats().iter().any(|f| f.id == format_id)
    }

    /// Whether files with `extension` (with or without the dot) can be
    /// imported.
    fn supports_import_extension(&self, extension: &str) -> bool {
        let wanted = extension.trim_start_matches('.');
        self.import_extensions()
            .split(';')
            .map(|p| p.trim().trim_start_matches("*.").trim_start_matches('.'))
            .any(|p| p.eq_ignore_ascii_case(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    struct Stub;

    #[allow(unsafe_code)]
    impl NativeApi for Stub {
        fn import_file(&self, _path: &CStr, _flags: u32) -> *const AiScene {
            ptr::null()
        }
        fn import_memory(&self, _data: &[u8], _flags: u32, _hint: &CStr) -> *const AiScene {
            ptr::null()
        }
        unsafe fn release_import(&self, _scene: *const AiScene) {}
        unsafe fn export_scene(
            &self,
            _scene: *const AiScene,
            _format_id: &CStr,
            _path: &CStr,
            _flags: u32,
        ) -> AiReturn {
            AiReturn::Failure
        }
        unsafe fn export_scene_to_blob(
            &self,
            _scene: *const AiScene,
            _format_id: &CStr,
            _flags: u32,
        ) -> *const AiExportDataBlob {
            ptr::null()
        }
        unsafe fn release_export_blob(&self, _blob: *const AiExportDataBlob) {}
        unsafe fn attach_log_stream(&self, _stream: *const AiLogStream) {}
        unsafe fn detach_log_stream(&self, _stream: *const AiLogStream) -> AiReturn {
            AiReturn::Failure
        }
        fn enable_verbose_logging(&self, _enabled: bool) {}
        fn error_string(&self) -> String {
            String::new()
        }
        fn export_formats(&self) -> Vec<ExportFormatDescription> {
            vec![ExportFormatDescription {
                id: "obj".into(),
                description: "Wavefront OBJ format".into(),
                file_extension: "obj".into(),
            }]
        }
        fn import_extensions(&self) -> String {
            "*.obj;*.FBX; *.dae".into()
        }
    }

    #[test]
    fn format_queries_use_the_lists() {
        assert!(Stub.supports_export_format("obj"));
        assert!(!Stub.supports_export_format("fbx"));
        assert!(Stub.supports_import_extension(".fbx"));
        assert!(Stub.supports_import_extension("dae"));
        assert!(!Stub.supports_import_extension("3ds"));
        assert_eq!(Stub.struct_size("aiMesh"), None);
    }
}
