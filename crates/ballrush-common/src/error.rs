//! Error types for Ballrush.

use thiserror::Error;

/// Top-level error type for Ballrush operations.
#[derive(Debug, Error)]
pub enum BallrushError {
    /// Persisted data could not be decoded
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Data-integrity errors for persisted blobs.
///
/// These are never surfaced to gameplay; callers log them and fall back to
/// defaults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Blob is shorter than its header
    #[error("Truncated blob: {len} bytes")]
    Truncated {
        /// Length actually read
        len: usize,
    },

    /// Magic bytes did not match
    #[error("Bad magic bytes: {0:?}")]
    BadMagic([u8; 4]),

    /// Payload failed to parse
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Result type alias for Ballrush operations.
pub type BallrushResult<T> = Result<T, BallrushError>;
