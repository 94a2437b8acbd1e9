//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use loam_core::InteropError;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The system allocator returned null, or the byte budget is spent.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes left under the configured budget, if one is set.
        capacity: Option<usize>,
    },
    /// A size or byte range does not fit the layout it addresses.
    InvalidLayout {
        /// Type or region being checked.
        type_name: String,
        /// Size the layout allows.
        expected: usize,
        /// Size that was requested or found.
        actual: usize,
    },
    /// A handle whose allocation has already been freed.
    StaleHandle {
        /// Address encoded in the handle.
        address: usize,
        /// Generation encoded in the handle.
        generation: u32,
    },
    /// A string with an interior NUL cannot become a C string.
    InteriorNul {
        /// Byte offset of the first NUL.
        position: usize,
    },
    /// Invalid [`ArenaConfig`](crate::ArenaConfig).
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                capacity,
            } => match capacity {
                Some(capacity) => write!(
                    f,
                    "arena out of memory: requested {requested} bytes, {capacity} bytes left in budget"
                ),
                None => write!(f, "arena out of memory: requested {requested} bytes"),
            },
            Self::InvalidLayout {
                type_name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "invalid layout for {type_name}: expected {expected} bytes, got {actual}"
                )
            }
            Self::StaleHandle {
                address,
                generation,
            } => {
                write!(
                    f,
                    "stale handle: address {address:#x}, generation {generation}"
                )
            }
            Self::InteriorNul { position } => {
                write!(f, "string contains NUL at byte {position}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}

impl From<ArenaError> for InteropError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::OutOfMemory {
                requested,
                capacity,
            } => InteropError::OutOfMemory {
                requested,
                capacity,
            },
            ArenaError::InvalidLayout {
                type_name,
                expected,
                actual,
            } => InteropError::InvalidLayout {
                type_name,
                expected,
                actual,
            },
            other @ (ArenaError::StaleHandle { .. }
            | ArenaError::InteriorNul { .. }
            | ArenaError::InvalidConfig { .. }) => InteropError::MarshalFailure {
                reason: other.to_string(),
            },
        }
    }
}
