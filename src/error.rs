//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Misses are never errors: lookups report them as `Ok(None)` or `Ok(false)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No segment can hold the block and the arena may not grow further
    #[error("Allocation failed: {requested} bytes requested, {available} bytes available")]
    AllocationFailed { requested: usize, available: usize },

    /// Numeric operation on an entry that does not hold an integer
    #[error("Type mismatch for key '{key}': expected int, found {found}")]
    TypeMismatch { key: String, found: &'static str },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The generator passed to `entry` returned an error
    #[error("Generator failed for key '{key}': {reason}")]
    GeneratorFailed { key: String, reason: String },

    /// The engine could not be initialized
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A lock could not be acquired within the configured timeout
    #[error("Lock contended for key: {0}")]
    Contended(String),

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Blob value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Contended(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
