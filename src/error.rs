//! Error types for the compaction engine
//!
//! Two very different failure families live here:
//!
//! - Recoverable setup errors (`CgcError`): bad configuration, failed
//!   segment reservation, block pool exhaustion. Returned as `Result`.
//! - Internal-consistency violations found during a compaction pass: an
//!   object kind that is illegal in its context, a chain word with an
//!   invalid discriminant, a malformed stack frame. These indicate a bug
//!   in the mark phase or a corrupted heap, are never retried, and abort
//!   via [`corruption`] with a diagnostic naming the offending word and
//!   address.

use thiserror::Error;

/// Main error type for all engine operations
#[derive(Debug, Error)]
pub enum CgcError {
    /// Invalid configuration detected
    ///
    /// **When returned:** `GcConfig::validate()` rejects a field value
    ///
    /// **Recovery strategy:** fix the configuration or fall back to defaults
    #[error("Configuration error: {0}")]
    Config(String),

    /// Heap initialization failed
    ///
    /// **When returned:** segment reservation or block table setup fails
    ///
    /// **Recovery strategy:** cannot recover; terminate gracefully
    #[error("Heap initialization failed: {0}")]
    HeapInit(String),

    /// Block pool exhausted
    ///
    /// **When returned:** a block allocation request cannot be satisfied
    ///
    /// **Recovery strategy:** free blocks or grow the segment
    #[error("Out of blocks: requested {requested}, available {available}")]
    OutOfBlocks { requested: usize, available: usize },

    /// Invalid internal state
    ///
    /// **When returned:** an operation is attempted in the wrong phase
    ///
    /// **Recovery strategy:** cannot recover; indicates a bug
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Internal error - indicates a bug in the engine
    ///
    /// **Recovery strategy:** cannot recover; report with a full trace
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CgcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CgcError::OutOfBlocks { .. } | CgcError::Config(_))
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            CgcError::InvalidState { .. } | CgcError::Internal(_)
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CgcError>;

/// Abort on a heap-consistency violation.
///
/// Correctness of the relocation passes is a precondition of overall
/// runtime correctness, not a recoverable feature: a bad kind code or a
/// chain word with an invalid discriminant means the mark phase or a
/// mutator has corrupted the heap. Log a diagnostic identifying the
/// offending address and word, then panic. Embedders that need a hard
/// process abort build with `panic = "abort"`.
#[cold]
pub fn corruption(context: &str, addr: usize, word: usize) -> ! {
    log::error!(
        "heap corruption: {} (address {:#x}, word {:#x})",
        context,
        addr,
        word
    );
    panic!(
        "heap corruption: {} (address {:#x}, word {:#x})",
        context, addr, word
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let oob = CgcError::OutOfBlocks {
            requested: 4,
            available: 1,
        };
        assert!(oob.is_recoverable());
        assert!(!oob.is_bug());

        let internal = CgcError::Internal("broken".to_string());
        assert!(internal.is_bug());
        assert!(!internal.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = CgcError::Config("segment size must be a block multiple".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    #[should_panic(expected = "heap corruption")]
    fn test_corruption_panics() {
        corruption("test violation", 0x1000, 0x3);
    }
}
