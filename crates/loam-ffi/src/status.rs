//! `aiReturn` status codes.

/// Status returned by the native export and detach entry points.
///
/// `Success` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiReturn {
    /// The call succeeded.
    Success = 0,
    /// The call failed; details via `aiGetErrorString`.
    Failure = -1,
    /// The native side ran out of memory.
    OutOfMemory = -3,
}

impl AiReturn {
    /// Parse a raw status. Unknown negative codes are treated as failure.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Success,
            -3 => Self::OutOfMemory,
            _ => Self::Failure,
        }
    }

    /// Whether this is [`AiReturn::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}
