//! Error Module - Heap and Collector Error Types
//!
//! Defines all error types used by the rye heap.

use thiserror::Error;

/// Main error type for all heap operations
#[derive(Debug, Error)]
pub enum GcError {
    #[error("heap node budget exhausted: {in_use} nodes in use, limit {limit}")]
    HeapExhausted { in_use: usize, limit: usize },

    #[error("cannot allocate vector of {units} units: {in_use} units in use, limit {limit}")]
    OutOfMemory {
        units: usize,
        in_use: usize,
        limit: usize,
    },

    #[error("vector length {length} exceeds the configured maximum {limit}")]
    SizeExceedsLimit { length: usize, limit: usize },

    #[error("protect(): protection stack overflow")]
    ProtectStackOverflow,

    #[error("unprotect(): only {depth} protected values, cannot pop {requested}")]
    ProtectStackUnderflow { depth: usize, requested: usize },

    #[error("weak reference keys must be environments or external pointers")]
    InvalidWeakKey,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GcError {
    /// Check if this error is recoverable by freeing memory or raising limits
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GcError::HeapExhausted { .. }
                | GcError::OutOfMemory { .. }
                | GcError::ProtectStackOverflow
        )
    }

    /// Check if this error indicates a bug in the embedding code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            GcError::Internal(_) | GcError::ProtectStackUnderflow { .. }
        )
    }
}

/// Result type alias for heap operations
pub type Result<T> = std::result::Result<T, GcError>;
