//! Error taxonomy for the interop layer.
//!
//! Every failure that crosses a public API boundary in Loam is an
//! [`InteropError`]. Lower layers (the arena in `loam-arena`) define their
//! own narrower error types and convert into this one.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised while moving data across the native boundary or while
/// managing the native library lifecycle.
#[derive(Debug)]
pub enum InteropError {
    /// The allocator could not satisfy a request. Fatal to the current
    /// operation, not to the process.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes still available under the configured budget, if any.
        capacity: Option<usize>,
    },
    /// A struct layout does not match what the native side expects, or a
    /// byte range exceeds the block it addresses.
    InvalidLayout {
        /// Native type name (e.g. `aiMesh`).
        type_name: String,
        /// Size the native side expects, in bytes.
        expected: usize,
        /// Size found on the managed side, in bytes.
        actual: usize,
    },
    /// The shared library could not be located, opened, or bound.
    LibraryLoadFailure {
        /// Path that was tried last, if any.
        path: Option<PathBuf>,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A native entry point was invoked while the library is unloaded.
    LibraryNotLoaded,
    /// Malformed native data, or managed data that cannot be represented
    /// natively.
    MarshalFailure {
        /// Human-readable description of what went wrong.
        reason: String,
    },
    /// The requested export format identifier is not offered by the
    /// loaded library.
    UnsupportedFormat {
        /// The rejected format identifier.
        format_id: String,
    },
    /// The native library reported an import failure.
    ImportFailed {
        /// Message from the native error string.
        reason: String,
    },
    /// The native library reported an export failure.
    ExportFailed {
        /// Message from the native error string.
        reason: String,
    },
    /// An I/O error occurred while reading or writing a blob stream or an
    /// output file.
    Io(io::Error),
}

impl InteropError {
    /// Shorthand for a [`InteropError::MarshalFailure`].
    pub fn marshal(reason: impl Into<String>) -> Self {
        Self::MarshalFailure {
            reason: reason.into(),
        }
    }

    /// Whether retrying after (re)loading the library could succeed.
    pub fn is_library_error(&self) -> bool {
        matches!(
            self,
            Self::LibraryLoadFailure { .. } | Self::LibraryNotLoaded
        )
    }
}

impl fmt::Display for InteropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                capacity,
            } => match capacity {
                Some(capacity) => write!(
                    f,
                    "out of native memory: requested {requested} bytes, {capacity} bytes available"
                ),
                None => write!(f, "out of native memory: requested {requested} bytes"),
            },
            Self::InvalidLayout {
                type_name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "invalid layout for {type_name}: expected {expected} bytes, found {actual} bytes"
                )
            }
            Self::LibraryLoadFailure { path, reason } => match path {
                Some(path) => write!(
                    f,
                    "failed to load native library {}: {reason}",
                    path.display()
                ),
                None => write!(f, "failed to load native library: {reason}"),
            },
            Self::LibraryNotLoaded => write!(f, "native library is not loaded"),
            Self::MarshalFailure { reason } => write!(f, "marshal failure: {reason}"),
            Self::UnsupportedFormat { format_id } => {
                write!(f, "unsupported export format '{format_id}'")
            }
            Self::ImportFailed { reason } => write!(f, "import failed: {reason}"),
            Self::ExportFailed { reason } => write!(f, "export failed: {reason}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for InteropError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for InteropError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_type_name_and_sizes() {
        let err = InteropError::InvalidLayout {
            type_name: "aiMesh".into(),
            expected: 1288,
            actual: 1280,
        };
        let msg = err.to_string();
        assert!(msg.contains("aiMesh"));
        assert!(msg.contains("1288"));
        assert!(msg.contains("1280"));
    }

    #[test]
    fn library_errors_are_flagged() {
        assert!(InteropError::LibraryNotLoaded.is_library_error());
        assert!(InteropError::LibraryLoadFailure {
            path: None,
            reason: "missing".into()
        }
        .is_library_error());
        assert!(!InteropError::marshal("bad").is_library_error());
    }

    #[test]
    fn io_error_is_source() {
        let err = InteropError::from(io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(err.source().is_some());
    }
}
