//! Error types for data parsing in heartlink-types.

use thiserror::Error;

/// Errors that can occur when decoding heart-rate payloads.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in heartlink-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than the decoder requires.
    #[error("Insufficient bytes: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes needed.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// The payload was long enough but held an unusable value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using heartlink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
