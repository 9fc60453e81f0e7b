//! Error types for protocol parsing in gamalta-types.

use thiserror::Error;

/// Errors that can occur when building or parsing Gamalta protocol data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in gamalta-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The frame is structurally invalid (bad header or too short).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Not enough bytes to decode a payload.
    #[error("Insufficient bytes: expected {expected}, got {actual}")]
    InsufficientBytes {
        /// Number of bytes required.
        expected: usize,
        /// Number of bytes available.
        actual: usize,
    },

    /// A value is outside its allowed range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A mode byte that does not map to any known light mode.
    #[error("Unknown mode: 0x{0:02X}")]
    UnknownMode(u8),
}

impl ParseError {
    /// Create a malformed frame error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }

    /// Create an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

/// Result type alias using gamalta-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
