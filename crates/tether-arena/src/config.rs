//! Arena configuration parameters.

use tether_core::{ArenaError, BlockAddr};

/// Configuration for a context tree.
///
/// Controls segment sizing and capacity limits. Validated by
/// [`ContextTree::new`](crate::ContextTree::new); all values are immutable
/// after creation.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Size of each context segment in bytes.
    ///
    /// Default: 8192. Must be a power of two and at least 64. A single
    /// allocation can never be larger than one segment.
    pub segment_size: u32,

    /// Maximum number of segments a single context may grow to.
    ///
    /// Default: 64. Bounded by the 8-bit segment field of [`BlockAddr`].
    pub max_segments: u16,

    /// Maximum number of simultaneously live contexts, root included.
    ///
    /// Default: 65_536. Bounded by [`BlockAddr::MAX_SLOT`].
    pub max_contexts: u32,
}

impl ArenaConfig {
    /// Default segment size in bytes.
    pub const DEFAULT_SEGMENT_SIZE: u32 = 8192;

    /// Default maximum segments per context.
    pub const DEFAULT_MAX_SEGMENTS: u16 = 64;

    /// Default maximum live contexts.
    pub const DEFAULT_MAX_CONTEXTS: u32 = 65_536;

    /// Smallest accepted segment size in bytes.
    pub const MIN_SEGMENT_SIZE: u32 = 64;

    /// Allocation alignment in bytes. Every block length is rounded up to it.
    pub const ALIGN: u32 = 8;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            segment_size: Self::DEFAULT_SEGMENT_SIZE,
            max_segments: Self::DEFAULT_MAX_SEGMENTS,
            max_contexts: Self::DEFAULT_MAX_CONTEXTS,
        }
    }

    /// Check the documented constraints.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if !self.segment_size.is_power_of_two() || self.segment_size < Self::MIN_SEGMENT_SIZE {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "segment_size must be a power of two and >= {} (got {})",
                    Self::MIN_SEGMENT_SIZE,
                    self.segment_size,
                ),
            });
        }
        if self.max_segments == 0 || self.max_segments > u8::MAX as u16 + 1 {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "max_segments must be in 1..=256 (got {})",
                    self.max_segments
                ),
            });
        }
        if self.max_contexts == 0 || self.max_contexts > BlockAddr::MAX_SLOT + 1 {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "max_contexts must be in 1..={} (got {})",
                    BlockAddr::MAX_SLOT as u64 + 1,
                    self.max_contexts
                ),
            });
        }
        Ok(())
    }

    /// Total byte capacity of one context.
    pub fn context_capacity_bytes(&self) -> usize {
        self.segment_size as usize * self.max_segments as usize
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
    fn defaults_are_valid() {
        assert!(ArenaConfig::new().validate().is_ok());
        assert_eq!(ArenaConfig::default().segment_size, 8192);
    }

    #[test]
    fn rejects_non_power_of_two_segment_size() {
        let config = ArenaConfig {
            segment_size: 1000,
            ..ArenaConfig::new()
        };
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_tiny_segment_size() {
        let config = ArenaConfig {
            segment_size: 32,
            ..ArenaConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_segments_bounded_by_address_width() {
        let mut config = ArenaConfig::new();
        config.max_segments = 256;
        assert!(config.validate().is_ok());
        config.max_segments = 257;
        assert!(config.validate().is_err());
        config.max_segments = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_contexts_bounded_by_address_width() {
        let config = ArenaConfig {
            max_contexts: BlockAddr::MAX_SLOT + 2,
            ..ArenaConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn context_capacity() {
        let config = ArenaConfig {
            segment_size: 1024,
            max_segments: 4,
            max_contexts: 8,
        };
        assert_eq!(config.context_capacity_bytes(), 4096);
    }
}
