//! The import/export session.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use loam_core::{ExportDataBlob, InteropError, Scene};
use loam_ffi::{transfer, ExportFormatDescription, LibraryLease, NativeApi, NativeLibrary};

use crate::postprocess::PostProcessSteps;

/// One session against a [`NativeLibrary`].
///
/// Creating an importer loads the library (or takes another reference to
/// it); dropping the importer gives that reference back. Any number of
/// importers, on any threads, may share one library. A session that
/// outlives a [`NativeLibrary::free_library`] gives nothing back on drop,
/// so it never takes a reference from a later load.
pub struct Importer {
    library: Arc<NativeLibrary>,
    lease: LibraryLease,
    steps: PostProcessSteps,
}

impl Importer {
    /// A session on the process-wide library.
    pub fn new() -> Result<Self, InteropError> {
        Self::with_library(NativeLibrary::global())
    }

    /// A session on `library`, loading it if needed.
    pub fn with_library(library: Arc<NativeLibrary>) -> Result<Self, InteropError> {
        let lease = library.load_library()?;
        Ok(Self {
            library,
            lease,
            steps: PostProcessSteps::empty(),
        })
    }

    /// A session on `library`, installing `api` as its binding if it is not
    /// loaded yet.
    pub fn with_binding(
        library: Arc<NativeLibrary>,
        api: Arc<dyn NativeApi>,
    ) -> Result<Self, InteropError> {
        let lease = library.load_with(api)?;
        Ok(Self {
            library,
            lease,
            steps: PostProcessSteps::empty(),
        })
    }

    /// The library this session holds a reference to.
    pub fn library(&self) -> &Arc<NativeLibrary> {
        &self.library
    }

    /// Steps applied to every import.
    pub fn post_process(&self) -> PostProcessSteps {
        self.steps
    }

    /// Set the steps applied to every import.
    pub fn set_post_process(&mut self, steps: PostProcessSteps) {
        self.steps = steps;
    }

    /// Builder form of [`Importer::set_post_process`].
    pub fn with_post_process(mut self, steps: PostProcessSteps) -> Self {
        self.steps = steps;
        self
    }

    // ── Import ──────────────────────────────────────────────────

    /// Import the file at `path`.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<Scene, InteropError> {
        let path = path.as_ref();
        let flags = self.steps.bits();
        self.library
            .with_api(|api| transfer::import_file(api, path, flags))?
    }

    /// Import a file held in memory. `format_hint` is its extension; pass
    /// `None` to let the library guess from the contents.
    pub fn import_from_memory(
        &self,
        data: &[u8],
        format_hint: Option<&str>,
    ) -> Result<Scene, InteropError> {
        let flags = self.steps.bits();
        let hint = format_hint.unwrap_or("");
        self.library
            .with_api(|api| transfer::import_memory(api, data, flags, hint))?
    }

    /// Read `reader` to the end and import what it held.
    pub fn import_from_reader(
        &self,
        mut reader: impl Read,
        format_hint: Option<&str>,
    ) -> Result<Scene, InteropError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.import_from_memory(&data, format_hint)
    }

    // ── Export ──────────────────────────────────────────────────

    /// Export `scene` to `path` as `format_id`.
    ///
    /// Fails with `UnsupportedFormat` before anything is written if the
    /// library has no such exporter. If the export fails after creating
    /// `path`, the partial file is removed; a file that existed beforehand
    /// is left alone.
    pub fn export_file(
        &self,
        scene: &Scene,
        path: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<(), InteropError> {
        self.export_file_with(scene, path, format_id, PostProcessSteps::empty())
    }

    /// [`Importer::export_file`] with steps applied to the scene first.
    pub fn export_file_with(
        &self,
        scene: &Scene,
        path: impl AsRef<Path>,
        format_id: &str,
        steps: PostProcessSteps,
    ) -> Result<(), InteropError> {
        let path = path.as_ref();
        let existed = path.exists();
        let result = self
            .library
            .with_api(|api| transfer::export_file(api, scene, format_id, path, steps.bits()))?;
        if let Err(e) = &result {
            if !existed && path.exists() {
                log::debug!("removing partial export {} after: {e}", path.display());
                if let Err(io) = fs::remove_file(path) {
                    log::warn!("could not remove partial export {}: {io}", path.display());
                }
            }
        }
        result
    }

    /// Export `scene` to memory as `format_id`.
    pub fn export_to_blob(
        &self,
        scene: &Scene,
        format_id: &str,
    ) -> Result<ExportDataBlob, InteropError> {
        self.export_to_blob_with(scene, format_id, PostProcessSteps::empty())
    }

    /// [`Importer::export_to_blob`] with steps applied to the scene first.
    pub fn export_to_blob_with(
        &self,
        scene: &Scene,
        format_id: &str,
        steps: PostProcessSteps,
    ) -> Result<ExportDataBlob, InteropError> {
        self.library
            .with_api(|api| transfer::export_blob(api, scene, format_id, steps.bits()))?
    }

    // ── Conversion ──────────────────────────────────────────────

    /// Import `input` and export it to `output` as `format_id`.
    pub fn convert_file_to_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<(), InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_file(input)?;
        self.export_file(&scene, output, format_id)
    }

    /// Import `input` and export it to memory as `format_id`.
    pub fn convert_file_to_blob(
        &self,
        input: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<ExportDataBlob, InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_file(input)?;
        self.export_to_blob(&scene, format_id)
    }

    /// Import `data` and export it to `output` as `format_id`.
    pub fn convert_memory_to_file(
        &self,
        data: &[u8],
        format_hint: Option<&str>,
        output: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<(), InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_from_memory(data, format_hint)?;
        self.export_file(&scene, output, format_id)
    }

    /// Import everything `reader` holds and export it to `output` as
    /// `format_id`.
    pub fn convert_reader_to_file(
        &self,
        reader: impl Read,
        format_hint: Option<&str>,
        output: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<(), InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_from_reader(reader, format_hint)?;
        self.export_file(&scene, output, format_id)
    }

    /// Import everything `reader` holds and export it to memory as
    /// `format_id`.
    pub fn convert_reader_to_blob(
        &self,
        reader: impl Read,
        format_hint: Option<&str>,
        format_id: &str,
    ) -> Result<ExportDataBlob, InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_from_reader(reader, format_hint)?;
        self.export_to_blob(&scene, format_id)
    }

    /// Import `data` and export it to memory as `format_id`.
    pub fn convert_memory_to_blob(
        &self,
        data: &[u8],
        format_hint: Option<&str>,
        format_id: &str,
    ) -> Result<ExportDataBlob, InteropError> {
        self.require_export_format(format_id)?;
        let scene = self.import_from_memory(data, format_hint)?;
        self.export_to_blob(&scene, format_id)
    }

    fn require_export_format(&self, format_id: &str) -> Result<(), InteropError> {
        if self.is_export_format_supported(format_id)? {
            Ok(())
        } else {
            Err(InteropError::UnsupportedFormat {
                format_id: format_id.to_string(),
            })
        }
    }

    // ── Formats ─────────────────────────────────────────────────

    /// Export formats the library offers.
    pub fn export_formats(&self) -> Result<Vec<ExportFormatDescription>, InteropError> {
        self.library.with_api(|api| api.export_formats())
    }

    /// Importable file extensions, with the leading dot (e.g. `.obj`).
    pub fn import_formats(&self) -> Result<Vec<String>, InteropError> {
        let list = self.library.with_api(|api| api.import_extensions())?;
        Ok(list
            .split(';')
            .map(|p| p.trim().trim_start_matches('*'))
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.starts_with('.') {
                    p.to_string()
                } else {
                    format!(".{p}")
                }
            })
            .collect())
    }

    /// Whether `format_id` names an export format.
    pub fn is_export_format_supported(&self, format_id: &str) -> Result<bool, InteropError> {
        self.library
            .with_api(|api| api.supports_export_format(format_id))
    }

    /// Whether files with `extension` (with or without the dot) import.
    pub fn is_import_format_supported(&self, extension: &str) -> Result<bool, InteropError> {
        self.library
            .with_api(|api| api.supports_import_extension(extension))
    }

    /// Turn the library's verbose logging on or off.
    pub fn set_verbose_logging(&self, enabled: bool) -> Result<(), InteropError> {
        self.library
            .with_api(|api| api.enable_verbose_logging(enabled))
    }
}

impl Drop for Importer {
    fn drop(&mut self) {
        self.library.release(self.lease);
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("post_process", &self.steps)
            .field("epoch", &self.lease.epoch())
            .field("library_refs", &self.library.ref_count())
            .finish()
    }
}
