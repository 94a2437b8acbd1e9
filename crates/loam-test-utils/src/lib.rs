//! Test utilities and mock types for Loam development.
//!
//! [`MockLibrary`] implements [`NativeApi`] entirely in process. Every scene
//! and blob it hands out lives in an arena the mock owns, so callers see the
//! same ownership split as with the real library: memory they receive must
//! go back through `release_import` / `release_export_blob`, never through
//! their own arena. The format logic is the small OBJ/MTL codec in [`obj`].

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod obj;

use std::ffi::{CStr, CString};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use loam_arena::NativeArena;
use loam_core::{ExportDataBlob, InteropError, Scene};
use loam_ffi::marshal::alloc_boxed;
use loam_ffi::types::{AiExportDataBlob, AiLogStream, AiScene};
use loam_ffi::{
    import_scene, layout, transfer, AiReturn, ExportFormatDescription, Marshal, NativeApi,
    NativeScene,
};

/// Export format id the mock offers.
pub const OBJ_FORMAT: &str = "obj";

/// `mtllib` name used in blob exports, which have no file name of their own.
pub const BLOB_MTL_NAME: &str = "$blobfile.mtl";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process stand-in for the Assimp shared library.
pub struct MockLibrary {
    imports: Mutex<IndexMap<usize, NativeScene>>,
    blobs: Mutex<IndexMap<usize, NativeArena>>,
    streams: Mutex<Vec<usize>>,
    verbose: AtomicBool,
    last_error: Mutex<String>,
    size_overrides: IndexMap<String, usize>,
    import_calls: AtomicUsize,
    export_calls: AtomicUsize,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self {
            imports: Mutex::new(IndexMap::new()),
            blobs: Mutex::new(IndexMap::new()),
            streams: Mutex::new(Vec::new()),
            verbose: AtomicBool::new(false),
            last_error: Mutex::new(String::new()),
            size_overrides: IndexMap::new(),
            import_calls: AtomicUsize::new(0),
            export_calls: AtomicUsize::new(0),
        }
    }

    /// Report `size` for the native struct `name` instead of the compiled
    /// size, to simulate a library built with a different layout.
    pub fn with_struct_size(mut self, name: &str, size: usize) -> Self {
        self.size_overrides.insert(name.to_string(), size);
        self
    }

    /// Blocks held by scenes and blobs not yet released.
    pub fn live_allocations(&self) -> usize {
        let scenes: usize = lock(&self.imports)
            .values()
            .map(|s| s.arena().live_allocations())
            .sum();
        let blobs: usize = lock(&self.blobs)
            .values()
            .map(NativeArena::live_allocations)
            .sum();
        scenes + blobs
    }

    /// Scenes handed out and not yet released.
    pub fn outstanding_imports(&self) -> usize {
        lock(&self.imports).len()
    }

    /// Blob chains handed out and not yet released.
    pub fn outstanding_blobs(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn attached_stream_count(&self) -> usize {
        lock(&self.streams).len()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Acquire)
    }

    pub fn import_calls(&self) -> usize {
        self.import_calls.load(Ordering::Relaxed)
    }

    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::Relaxed)
    }

    /// Deliver `message` to every attached stream, as the library's logger
    /// would.
    #[allow(unsafe_code)]
    pub fn emit(&self, message: &str) {
        let Ok(text) = CString::new(format!("{message}\n")) else {
            return;
        };
        let streams = lock(&self.streams).clone();
        for addr in streams {
            // SAFETY: attached streams stay valid until detached, and the
            // caller of `attach_log_stream` guaranteed that.
            let stream = unsafe { &*(addr as *const AiLogStream) };
            if let Some(callback) = stream.callback {
                callback(text.as_ptr(), stream.user);
            }
        }
    }

    fn info(&self, message: &str) {
        self.emit(&format!("Info,  T0: {message}"));
    }

    fn warn(&self, message: &str) {
        self.emit(&format!("Warn,  T0: {message}"));
    }

    fn debug(&self, message: &str) {
        if self.is_verbose() {
            self.emit(&format!("Debug, T0: {message}"));
        }
    }

    fn fail(&self, message: String) {
        self.emit(&format!("Error, T0: {message}"));
        *lock(&self.last_error) = message;
    }

    /// Marshal `scene` into a fresh arena owned by the mock.
    fn publish(&self, scene: &Scene) -> *const AiScene {
        match NativeScene::export(scene) {
            Ok(native) => {
                let ptr = native.as_ptr();
                lock(&self.imports).insert(ptr as usize, native);
                ptr
            }
            Err(e) => {
                self.fail(format!("scene could not be marshaled: {e}"));
                std::ptr::null()
            }
        }
    }

    fn import_text(
        &self,
        text: &str,
        root_name: &str,
        flags: u32,
        load_mtl: &mut dyn FnMut(&str) -> Option<String>,
    ) -> *const AiScene {
        self.import_calls.fetch_add(1, Ordering::Relaxed);
        self.debug(&format!("post-processing flags {flags:#x}"));
        match obj::read_obj(text, root_name, load_mtl) {
            Ok(import) => {
                for warning in &import.warnings {
                    self.warn(warning);
                }
                let ptr = self.publish(&import.scene);
                if !ptr.is_null() {
                    self.info("Import successful");
                }
                ptr
            }
            Err(e) => {
                self.fail(e.to_string());
                std::ptr::null()
            }
        }
    }

    fn check_format(&self, format_id: &CStr) -> bool {
        let id = format_id.to_string_lossy();
        if id == OBJ_FORMAT {
            true
        } else {
            self.fail(format!("Found no exporter to handle this file format: {id}"));
            false
        }
    }

    fn encode(scene: &Scene, mtl_name: &str) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
        let mut obj_bytes = Vec::new();
        obj::write_obj(scene, Some(mtl_name), &mut obj_bytes)?;
        let mut mtl_bytes = Vec::new();
        obj::write_mtl(scene, &mut mtl_bytes)?;
        Ok((obj_bytes, mtl_bytes))
    }

    fn write_files(scene: &Scene, path: &Path) -> std::io::Result<()> {
        let mtl_path = path.with_extension("mtl");
        let mtl_name = mtl_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut out = BufWriter::new(File::create(path)?);
        obj::write_obj(scene, Some(&mtl_name), &mut out)?;
        out.flush()?;
        let mut out = BufWriter::new(File::create(&mtl_path)?);
        obj::write_mtl(scene, &mut out)?;
        out.flush()
    }
}

impl Default for MockLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(unsafe_code)]
impl NativeApi for MockLibrary {
    fn import_file(&self, path: &CStr, flags: u32) -> *const AiScene {
        let path_str = path.to_string_lossy().into_owned();
        self.info(&format!("Load {path_str}"));
        let path = Path::new(&path_str);
        let is_obj = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(OBJ_FORMAT));
        if !is_obj {
            self.fail(format!(
                "No suitable reader found for the file format of file \"{path_str}\"."
            ));
            return std::ptr::null();
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                self.fail(format!("Unable to open file \"{path_str}\"."));
                return std::ptr::null();
            }
        };
        let root_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut load_mtl = |name: &str| fs::read_to_string(dir.join(name)).ok();
        self.import_text(&text, &root_name, flags, &mut load_mtl)
    }

    fn import_memory(&self, data: &[u8], flags: u32, hint: &CStr) -> *const AiScene {
        let hint = hint.to_string_lossy();
        if !hint.is_empty() && !hint.eq_ignore_ascii_case(OBJ_FORMAT) {
            self.fail(format!("No suitable reader found for the hint \"{hint}\"."));
            return std::ptr::null();
        }
        let Ok(text) = std::str::from_utf8(data) else {
            self.fail("OBJ: buffer is not valid UTF-8".to_string());
            return std::ptr::null();
        };
        let root_name = format!("$$$___magic___$$$.{OBJ_FORMAT}");
        self.import_text(text, &root_name, flags, &mut |_| None)
    }

    unsafe fn release_import(&self, scene: *const AiScene) {
        if scene.is_null() {
            return;
        }
        if lock(&self.imports).shift_remove(&(scene as usize)).is_none() {
            log::warn!("mock library asked to release unknown scene {scene:p}");
        }
    }

    unsafe fn export_scene(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        path: &CStr,
        flags: u32,
    ) -> AiReturn {
        self.export_calls.fetch_add(1, Ordering::Relaxed);
        if !self.check_format(format_id) {
            return AiReturn::Failure;
        }
        self.debug(&format!("export flags {flags:#x}"));
        // SAFETY: valid scene per the caller.
        let scene = match unsafe { import_scene(scene) } {
            Ok(scene) => scene,
            Err(e) => {
                self.fail(format!("invalid scene: {e}"));
                return AiReturn::Failure;
            }
        };
        let path = path.to_string_lossy().into_owned();
        match Self::write_files(&scene, Path::new(&path)) {
            Ok(()) => {
                self.info(&format!("Exported {path}"));
                AiReturn::Success
            }
            Err(e) => {
                self.fail(format!("Unable to write \"{path}\": {e}"));
                AiReturn::Failure
            }
        }
    }

    unsafe fn export_scene_to_blob(
        &self,
        scene: *const AiScene,
        format_id: &CStr,
        _flags: u32,
    ) -> *const AiExportDataBlob {
        self.export_calls.fetch_add(1, Ordering::Relaxed);
        if !self.check_format(format_id) {
            return std::ptr::null();
        }
        // SAFETY: valid scene per the caller.
        let scene = match unsafe { import_scene(scene) } {
            Ok(scene) => scene,
            Err(e) => {
                self.fail(format!("invalid scene: {e}"));
                return std::ptr::null();
            }
        };
        let (obj_bytes, mtl_bytes) = match Self::encode(&scene, BLOB_MTL_NAME) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.fail(format!("encoding failed: {e}"));
                return std::ptr::null();
            }
        };
        let mut head = ExportDataBlob::new("", obj_bytes);
        head.next = Some(Box::new(ExportDataBlob::new("mtl", mtl_bytes)));

        let arena = NativeArena::with_defaults();
        match alloc_boxed(&arena, &head) {
            Ok(ptr) => {
                lock(&self.blobs).insert(ptr as usize, arena);
                ptr
            }
            Err(e) => {
                arena.free_all();
                self.fail(format!("blob could not be marshaled: {e}"));
                std::ptr::null()
            }
        }
    }

    unsafe fn release_export_blob(&self, blob: *const AiExportDataBlob) {
        if blob.is_null() {
            return;
        }
        let Some(arena) = lock(&self.blobs).shift_remove(&(blob as usize)) else {
            log::warn!("mock library asked to release unknown blob {blob:p}");
            return;
        };
        // SAFETY: `blob` was produced by `alloc_boxed` into `arena`.
        unsafe { ExportDataBlob::free_native(&arena, blob.cast_mut(), true) };
    }

    unsafe fn attach_log_stream(&self, stream: *const AiLogStream) {
        let mut streams = lock(&self.streams);
        if !streams.contains(&(stream as usize)) {
            streams.push(stream as usize);
        }
    }

    unsafe fn detach_log_stream(&self, stream: *const AiLogStream) -> AiReturn {
        let mut streams = lock(&self.streams);
        match streams.iter().position(|&s| s == stream as usize) {
            Some(i) => {
                streams.remove(i);
                AiReturn::Success
            }
            None => AiReturn::Failure,
        }
    }

    fn enable_verbose_logging(&self, enabled: bool) {
        self.verbose.store(enabled, Ordering::Release);
    }

    fn error_string(&self) -> String {
        lock(&self.last_error).clone()
    }

    fn export_formats(&self) -> Vec<ExportFormatDescription> {
        vec![ExportFormatDescription {
            id: OBJ_FORMAT.into(),
            description: "Wavefront OBJ format".into(),
            file_extension: OBJ_FORMAT.into(),
        }]
    }

    fn import_extensions(&self) -> String {
        "*.obj".into()
    }

    fn struct_size(&self, name: &str) -> Option<usize> {
        if let Some(&size) = self.size_overrides.get(name) {
            return Some(size);
        }
        layout::native_sizes().ok()?.get(name).copied()
    }
}

impl std::fmt::Debug for MockLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLibrary")
            .field("outstanding_imports", &self.outstanding_imports())
            .field("outstanding_blobs", &self.outstanding_blobs())
            .field("attached_streams", &self.attached_stream_count())
            .field("verbose", &self.is_verbose())
            .finish()
    }
}

/// Push `scene` through `api` as an OBJ blob and import the result, the
/// way a caller with only a managed scene would.
pub fn reimport_via_blob(api: &dyn NativeApi, scene: &Scene) -> Result<Scene, InteropError> {
    let chain = transfer::export_blob(api, scene, OBJ_FORMAT, 0)?;
    transfer::import_memory(api, &chain.data, 0, OBJ_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use loam_ffi::LogStream;

    #[test]
    #[allow(unsafe_code)]
    fn memory_import_and_release_balance() {
        let mock = MockLibrary::new();
        let scene = mock.import_memory(fixtures::TRIANGLE_OBJ.as_bytes(), 0, c"obj");
        assert!(!scene.is_null());
        assert_eq!(mock.outstanding_imports(), 1);
        assert!(mock.live_allocations() > 0);
        // SAFETY: fresh scene from the mock.
        let managed = unsafe { import_scene(scene) }.unwrap();
        assert_eq!(managed.meshes[0].vertex_count(), 3);
        // SAFETY: released once.
        unsafe { mock.release_import(scene) };
        assert_eq!(mock.outstanding_imports(), 0);
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    fn unknown_hint_sets_error_string() {
        let mock = MockLibrary::new();
        assert!(mock.import_memory(b"", 0, c"fbx").is_null());
        assert!(mock.error_string().contains("fbx"));
        assert!(mock.import_file(c"/nonexistent/x.obj", 0).is_null());
        assert!(mock.error_string().contains("Unable to open file"));
    }

    #[test]
    fn blob_reimport_keeps_geometry() {
        let mock = MockLibrary::new();
        let scene = fixtures::triangle_scene();
        let back = reimport_via_blob(&mock, &scene).unwrap();
        assert_eq!(back.meshes.len(), 1);
        assert_eq!(back.meshes[0].vertices, scene.meshes[0].vertices);
        assert_eq!(back.meshes[0].indices(), vec![0, 1, 2]);
        // Blob exports reference no readable MTL file, so only the default
        // material survives an in-memory round trip.
        assert_eq!(back.materials.len(), 1);
        assert_eq!(mock.outstanding_blobs(), 0);
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn unsupported_export_format_fails() {
        let mock = MockLibrary::new();
        let native = NativeScene::export(&fixtures::triangle_scene()).unwrap();
        // SAFETY: `native` is a complete scene.
        let rc = unsafe { mock.export_scene(native.as_ptr(), c"fbx", c"/tmp/never.fbx", 0) };
        assert_eq!(rc, AiReturn::Failure);
        assert!(mock.error_string().contains("fbx"));
        assert!(!Path::new("/tmp/never.fbx").exists());
    }

    #[test]
    #[allow(unsafe_code)]
    fn attached_streams_receive_messages() {
        let mock = MockLibrary::new();
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let stream = LogStream::new(move |msg, _| lock(&sink).push(msg.to_string())).unwrap();
        // SAFETY: `stream` outlives the attachment.
        unsafe { mock.attach_log_stream(stream.native_ptr()) };
        mock.import_memory(fixtures::TRIANGLE_OBJ.as_bytes(), 0, c"obj");
        let messages = lock(&seen).clone();
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Info,  T0: Import successful")));
        // SAFETY: as above.
        let rc = unsafe { mock.detach_log_stream(stream.native_ptr()) };
        assert_eq!(rc, AiReturn::Success);
        assert_eq!(mock.attached_stream_count(), 0);
    }

    #[test]
    fn size_overrides_replace_compiled_sizes() {
        let mock = MockLibrary::new().with_struct_size("aiMesh", 1);
        assert_eq!(mock.struct_size("aiMesh"), Some(1));
        assert_eq!(
            mock.struct_size("aiFace"),
            Some(std::mem::size_of::<loam_ffi::types::AiFace>())
        );
        assert_eq!(mock.struct_size("aiNotAType"), None);
    }
}
