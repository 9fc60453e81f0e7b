//! Error types for gamalta-core.
//!
//! This module defines all error types that can occur when talking to a
//! Gamalta light over Bluetooth Low Energy.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Timeout`] during the handshake | Disconnect, then reconnect | Session is faulted |
//! | [`Error::Timeout`] on a steady-state command | Retry the command | Session stays ready |
//! | [`Error::NotReady`] | Wait for or redo the handshake | Commands need a ready session |
//! | [`Error::Bluetooth`] | Reconnect | Link is usually gone |
//! | [`Error::Transport`] | Reconnect | Link dropped mid-exchange |
//! | [`Error::InvalidArgument`] | Do not retry | Fix the input |
//! | [`Error::MalformedFrame`] | Do not retry | Device sent garbage |
//! | [`Error::DeviceNotFound`] | Do not retry | Light not in range or wrong name |
//! | [`Error::CharacteristicNotFound`] | Do not retry | Not a Gamalta light |
//! | [`Error::Cancelled`] | Do not retry | Session was closed by the caller |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! ## Recommended Timeouts
//!
//! | Operation | Recommended Timeout | Notes |
//! |-----------|---------------------|-------|
//! | Device scan | 5-10 seconds | Lights advertise frequently |
//! | Connection | 10-15 seconds | Includes service discovery |
//! | Login reply | 5 seconds | Usually arrives within 100ms |
//! | Command reply | 2 seconds | Some commands never reply |

use std::time::Duration;

use gamalta_types::{ParseError, SessionState};
use thiserror::Error;

/// Errors that can occur when communicating with Gamalta lights.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while the transport has no link.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// A frame from the device could not be decoded.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A caller-supplied value was out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A command was issued before the session reached `Ready`.
    #[error("Session not ready (state: {state})")]
    NotReady {
        /// State the session was in.
        state: SessionState,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The transport failed or dropped while an operation was in flight.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A reply carried an opcode that answers no known request.
    #[error("Unknown response opcode 0x{opcode:02X}")]
    UnknownResponse {
        /// The unrecognised opcode.
        opcode: u8,
        /// Full frame bytes.
        raw: Vec<u8>,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No lights found during scan.
    NoDevicesInRange,
    /// Light with the specified name/address not found.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevicesInRange => write!(f, "no Gamalta lights in range"),
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a not-ready error for the given state.
    pub fn not_ready(state: SessionState) -> Self {
        Self::NotReady { state }
    }

    /// Whether the error leaves a ready session usable.
    ///
    /// Timeouts on steady-state commands and argument errors are recoverable;
    /// link failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::InvalidArgument(_)
                | Error::MalformedFrame(_)
                | Error::UnknownResponse { .. }
        )
    }
}

/// Caller-side conversion: `InvalidValue` comes from validating arguments
/// and becomes [`Error::InvalidArgument`]. Everything else describes device
/// bytes. Payloads decoded off the notification path are always reported as
/// [`Error::MalformedFrame`].
impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidValue(msg) => Error::InvalidArgument(msg),
            ParseError::UnknownMode(byte) => {
                Error::MalformedFrame(format!("Unknown mode: 0x{:02X}", byte))
            }
            ParseError::MalformedFrame(msg) => Error::MalformedFrame(msg),
            ParseError::InsufficientBytes { expected, actual } => Error::MalformedFrame(format!(
                "payload too short: expected {} bytes, got {}",
                expected, actual
            )),
            // Handle future ParseError variants (non_exhaustive)
            _ => Error::MalformedFrame(format!("Parse error: {}", err)),
        }
    }
}

/// Result type alias using gamalta-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
