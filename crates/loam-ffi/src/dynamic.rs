//! [`NativeApi`] backed by the Assimp shared library, bound at runtime.

use std::ffi::{c_char, c_int, c_uint, CStr};
use std::path::{Path, PathBuf};

use libloading::Library;
use loam_core::InteropError;

use crate::api::{ExportFormatDescription, NativeApi};
use crate::status::AiReturn;
use crate::types::{AiExportDataBlob, AiExportFormatDesc, AiLogStream, AiScene, AiString};

type ImportFileFn = unsafe extern "C" fn(*const c_char, c_uint) -> *const AiScene;
type ImportMemoryFn =
    unsafe extern "C" fn(*const c_char, c_uint, c_uint, *const c_char) -> *const AiScene;
type ReleaseImportFn = unsafe extern "C" fn(*const AiScene);
type ExportSceneFn =
    unsafe extern "C" fn(*const AiScene, *const c_char, *const c_char, c_uint) -> c_int;
type ExportBlobFn =
    unsafe extern "C" fn(*const AiScene, *const c_char, c_uint) -> *const AiExportDataBlob;
type ReleaseBlobFn = unsafe extern "C" fn(*const AiExportDataBlob);
type AttachLogFn = unsafe extern "C" fn(*const AiLogStream);
type DetachLogFn = unsafe extern "C" fn(*const AiLogStream) -> c_int;
type VerboseFn = unsafe extern "C" fn(c_int);
type ErrorStringFn = unsafe extern "C" fn() -> *const c_char;
type FormatCountFn = unsafe extern "C" fn() -> usize;
type FormatDescFn = unsafe extern "C" fn(usize) -> *const AiExportFormatDesc;
type ReleaseFormatDescFn = unsafe extern "C" fn(*const AiExportFormatDesc);
type ExtensionListFn = unsafe extern "C" fn(*mut AiString);

struct Functions {
    import_file: ImportFileFn,
    import_memory: ImportMemoryFn,
    release_import: ReleaseImportFn,
    export_scene: ExportSceneFn,
    export_blob: ExportBlobFn,
    release_blob: ReleaseBlobFn,
    attach_log: AttachLogFn,
    detach_log: DetachLogFn,
    verbose: VerboseFn,
    error_string: ErrorStringFn,
    format_count: FormatCountFn,
    format_desc: FormatDescFn,
    // Missing from builds older than 4.0.
    release_format_desc: Option<ReleaseFormatDescFn>,
    extension_list: ExtensionListFn,
}

/// The Assimp C API, loaded with `libloading`.
///
/// Function pointers are copied out of the library at open time, so a
/// missing symbol fails the open rather than a later call. They stay valid
/// for as long as the library handle held alongside them.
pub struct DynamicApi {
    path: PathBuf,
    fns: Functions,
    _library: Library,
}

#[allow(unsafe_code)]
unsafe fn symbol<T: Copy>(library: &Library, name: &str, path: &Path) -> Result<T, InteropError> {
    let mut cname = Vec::with_capacity(name.len() + 1);
    cname.extend_from_slice(name.as_bytes());
    cname.push(0);
    // SAFETY: `T` is the declared C signature of `name`, per the caller.
    let sym = unsafe { library.get::<T>(&cname) }.map_err(|e| InteropError::LibraryLoadFailure {
        path: Some(path.to_path_buf()),
        reason: format!("missing symbol {name}: {e}"),
    })?;
    Ok(*sym)
}

#[allow(unsafe_code)]
fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: the library returns NUL-terminated strings that live at
    // least until its next call on this thread.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl DynamicApi {
    /// Open the library at `path` and bind every entry point.
    #[allow(unsafe_code)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InteropError> {
        let path = path.as_ref();
        // SAFETY: loading Assimp runs its static initialisers only, which
        // have no preconditions.
        let library = unsafe { Library::new(path) }.map_err(|e| {
            InteropError::LibraryLoadFailure {
                path: Some(path.to_path_buf()),
                reason: e.to_string(),
            }
        })?;
        // SAFETY: each type alias matches the Assimp 4.1 C declaration.
        let fns = unsafe {
            Functions {
                import_file: symbol(&library, "aiImportFile", path)?,
                import_memory: symbol(&library, "aiImportFileFromMemory", path)?,
                release_import: symbol(&library, "aiReleaseImport", path)?,
                export_scene: symbol(&library, "aiExportScene", path)?,
                export_blob: symbol(&library, "aiExportSceneToBlob", path)?,
                release_blob: symbol(&library, "aiReleaseExportBlob", path)?,
                attach_log: symbol(&library, "aiAttachLogStream", path)?,
                detach_log: symbol(&library, "aiDetachLogStream", path)?,
                verbose: symbol(&library, "aiEnableVerboseLogging", path)?,
                error_string: symbol(&library, "aiGetErrorString", path)?,
                format_count: symbol(&library, "aiGetExportFormatCount", path)?,
                format_desc: symbol(&library, "aiGetExportFormatDescription", path)?,
                release_format_desc: symbol(&library, "aiReleaseExportFormatDescription", path)
                    .ok(),
                extension_list: symbol(&library, "aiGetExtensionList", path)?,
            }
        };
        log::debug!("bound assimp entry points from {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            fns,
            _library: library,
        })
    }

    /// Try each candidate in order and return the first that opens.
    ///
    /// The error names the last candidate tried.
    pub fn open_first<I, P>(candidates: I) -> Result<Self, InteropError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut last = InteropError::LibraryLoadFailure {
            path: None,
            reason: "no library candidates".into(),
        };
        for candidate in candidates {
            match Self::open(candidate.as_ref()) {
                Ok(api) => return Ok(api),
                Err(e) => {
                    log::debug!("assimp candidate rejected: {e}");
                    last = e;
                }
            }
        }
        Err(last)
    }

    /// Path the library was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[allow(unsafe_code)]
impl NativeApi for DynamicApi {
    fn import_file(&self, path: &CStr, flags: u32) -> *const AiScene {
        // SAFETY: `path` is NUL-terminated.
        unsafe { (self.fns.import_file)(path.as_ptr(), flags) }
    }

    fn import_memory(&self, data: &[u8], flags: u32, hint: &CStr) -> *const AiScene {
        let Ok(len) = c_uint::try_from(data.len()) else {
            return std::ptr::null();
        };
        // SAFETY: `data` is valid for `len` bytes; `hint` is NUL-terminated.
        unsafe { (self.fns.import_memory)(data.as_ptr().cast(), len, flags, hint.as_ptr()) }
    }

    unsafe fn release_import(&self, scene: *const AiScene) {
        if !scene.is_null() {
            // SAFETY: forwarded to the caller.
            unsafe { (self.fns.release_import)(scene) }
        }
    }

    unsafe fn export_scene(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        path: &CStr,
        flags: u32,
    ) -> AiReturn {
        // SAFETY: forwarded to the caller; strings are NUL-terminated.
        let raw =
            unsafe { (self.fns.export_scene)(scene, format_id.as_ptr(), path.as_ptr(), flags) };
        AiReturn::from_raw(raw)
    }

    unsafe fn export_scene_to_blob(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        flags: u32,
    ) -> *const AiExportDataBlob {
        // SAFETY: forwarded to the caller.
        unsafe { (self.fns.export_blob)(scene, format_id.as_ptr(), flags) }
    }

    unsafe fn release_export_blob(&self, blob: *const AiExportDataBlob) {
        if !blob.is_null() {
            // SAFETY: forwarded to the caller.
            unsafe { (self.fns.release_blob)(blob) }
        }
    }

    unsafe fn attach_log_stream(&self, stream: *const AiLogStream) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.fns.attach_log)(stream) }
    }

    unsafe fn detach_log_stream(&self, stream: *const AiLogStream) -> AiReturn {
        // SAFETY: forwarded to the caller.
        AiReturn::from_raw(unsafe { (self.fns.detach_log)(stream) })
    }

    fn enable_verbose_logging(&self, enabled: bool) {
        // SAFETY: no pointer arguments.
        unsafe { (self.fns.verbose)(c_int::from(enabled)) }
    }

    fn error_string(&self) -> String {
        // SAFETY: no arguments; the result is checked for null.
        lossy(unsafe { (self.fns.error_string)() })
    }

    fn export_formats(&self) -> Vec<ExportFormatDescription> {
        // SAFETY: no arguments.
        let count = unsafe { (self.fns.format_count)() };
        let mut formats = Vec::with_capacity(count);
        for i in 0..count {
            // SAFETY: `i` is below the reported count.
            let desc = unsafe { (self.fns.format_desc)(i) };
            if desc.is_null() {
                continue;
            }
            // SAFETY: non-null description returned by the library.
            let d = unsafe { *desc };
            formats.push(ExportFormatDescription {
                id: lossy(d.id),
                description: lossy(d.description),
                file_extension: lossy(d.file_extension),
            });
            if let Some(release) = self.fns.release_format_desc {
                // SAFETY: `desc` came from `aiGetExportFormatDescription`.
                unsafe { release(desc) };
            }
        }
        formats
    }

    fn import_extensions(&self) -> String {
        let mut out = AiString::EMPTY;
        // SAFETY: `out` is a valid, writable `aiString`.
        unsafe { (self.fns.extension_list)(&mut out) };
        out.to_string_lossy().unwrap_or_default()
    }
}

impl std::fmt::Debug for DynamicApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicApi").field("path", &self.path).finish()
    }
}
