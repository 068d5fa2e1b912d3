//! Configuration Module - Engine Tuning Parameters
//!
//! Manages the configuration parameters for the compaction engine.
//! Most parameters have sensible defaults; `validate()` rejects
//! combinations the block pool cannot honor.

use crate::error::{CgcError, Result};
use crate::heap::block::BLOCK_BYTES;

/// Kilobyte
pub const KB: usize = 1024;
/// Megabyte
pub const MB: usize = 1024 * KB;

/// Main configuration for the compaction engine
///
/// # Examples
///
/// ```rust
/// use cgc::GcConfig;
///
/// // Use default configuration
/// let config = GcConfig::default();
/// assert!(config.validate().is_ok());
///
/// // Custom configuration for a small test heap
/// let config = GcConfig {
///     segment_size: 64 * 4096,
///     generations: 2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Size in bytes of the block pool reserved up front
    ///
    /// Must be a multiple of the block size. The pool is reserved as one
    /// contiguous anonymous mapping and carved into fixed-size blocks.
    ///
    /// Default: 8MB
    pub segment_size: usize,

    /// Number of generations
    ///
    /// Only the oldest generation is compacted in place; younger
    /// generations participate in the forward update only.
    ///
    /// Default: 2
    pub generations: usize,

    /// Number of mark workers that may contribute per-generation
    /// todo/partial block lists
    ///
    /// The forward pass iterates one todo and one partial list per worker
    /// per generation. If the mark phase ran single-threaded, set to 1.
    ///
    /// Default: number of CPUs, capped at 8
    pub mark_workers: usize,

    /// Enable verbose compaction logging
    ///
    /// Default: false
    pub verbose: bool,

    /// Enable statistics collection
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        let workers = num_cpus::get().clamp(1, 8);
        GcConfig {
            segment_size: 8 * MB,
            generations: 2,
            mark_workers: workers,
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// Checks that all values are in valid ranges.
    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 || self.segment_size % BLOCK_BYTES != 0 {
            return Err(CgcError::Config(format!(
                "segment_size {} must be a non-zero multiple of the block size {}",
                self.segment_size, BLOCK_BYTES
            )));
        }
        if self.segment_size / BLOCK_BYTES < 2 {
            return Err(CgcError::Config(
                "segment must hold at least two blocks".to_string(),
            ));
        }
        if self.generations == 0 {
            return Err(CgcError::Config(
                "at least one generation is required".to_string(),
            ));
        }
        if self.generations > 16 {
            return Err(CgcError::Config(format!(
                "{} generations requested, maximum is 16",
                self.generations
            )));
        }
        if self.mark_workers == 0 {
            return Err(CgcError::Config(
                "at least one mark worker list is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of blocks the configured segment holds
    pub fn block_count(&self) -> usize {
        self.segment_size / BLOCK_BYTES
    }
}
