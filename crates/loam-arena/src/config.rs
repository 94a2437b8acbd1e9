//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for a [`NativeArena`](crate::NativeArena).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Minimum alignment of every block, in bytes.
    ///
    /// Default: 16. Must be a power of two and at least 8 so any native
    /// struct (pointer-aligned at most) can be placed at offset zero.
    pub alignment: usize,

    /// Upper bound on live bytes, or `None` for no limit.
    ///
    /// Allocations that would exceed the budget fail with
    /// [`ArenaError::OutOfMemory`] before the system allocator is called.
    pub max_bytes: Option<usize>,
}

impl ArenaConfig {
    /// Default block alignment.
    pub const DEFAULT_ALIGNMENT: usize = 16;

    /// Smallest accepted alignment.
    pub const MIN_ALIGNMENT: usize = 8;

    /// Default configuration: 16-byte alignment, no budget.
    pub fn new() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
            max_bytes: None,
        }
    }

    /// Builder: cap live bytes at `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Builder: set the block alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if !self.alignment.is_power_of_two() || self.alignment < Self::MIN_ALIGNMENT {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "alignment must be a power of two >= {}, got {}",
                    Self::MIN_ALIGNMENT,
                    self.alignment
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = ArenaConfig::default();
        assert_eq!(config.alignment, 16);
        assert_eq!(config.max_bytes, None);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_alignment() {
        assert!(ArenaConfig::new().with_alignment(12).validate().is_err());
        assert!(ArenaConfig::new().with_alignment(4).validate().is_err());
        ArenaConfig::new().with_alignment(64).validate().unwrap();
    }
}
