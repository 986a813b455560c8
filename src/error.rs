//! Error types and handling for Magbank
//!
//! This module defines the error types used throughout the application.
//! Packet decoding and acquisition have their own narrow error enums so the
//! orchestrator can match on them; everything else funnels into
//! [`MonitorError`].

use thiserror::Error;

/// Result type alias for Magbank operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// A transfer that could not be turned into samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Transfer length differs from the fixed packet size
    #[error("packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Device frame does not start with the tester's sync byte
    #[error("unexpected frame header byte 0x{found:02X}")]
    BadHeader { found: u8 },
}

/// Transport-level failures while reading from the tester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    /// No transfer arrived within the read timeout
    #[error("read timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Device vanished, could not be opened, or the transfer failed
    #[error("device gone: {reason}")]
    DeviceGone { reason: String },

    /// The source has no more transfers to deliver
    #[error("end of stream")]
    EndOfStream,
}

impl AcquisitionError {
    /// Create a new device-gone error
    pub fn gone<S: Into<String>>(reason: S) -> Self {
        AcquisitionError::DeviceGone {
            reason: reason.into(),
        }
    }
}

/// Main error type for Magbank
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// USB communication errors
    #[error("USB error: {message}")]
    Usb { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Malformed packet
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport failure
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl MonitorError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        MonitorError::Config {
            message: message.into(),
        }
    }

    /// Create a new USB error
    pub fn usb<S: Into<String>>(message: S) -> Self {
        MonitorError::Usb {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        MonitorError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        MonitorError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        MonitorError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        MonitorError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for MonitorError {
    fn from(err: serde_yaml::Error) -> Self {
        MonitorError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MonitorError::config("test config error");
        assert!(matches!(err, MonitorError::Config { .. }));

        let err = MonitorError::usb("test usb error");
        assert!(matches!(err, MonitorError::Usb { .. }));

        let err = MonitorError::validation("field", "test validation error");
        assert!(matches!(err, MonitorError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = MonitorError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = MonitorError::validation("test_field", "invalid value");
        assert_eq!(
            format!("{}", err),
            "Validation error: test_field - invalid value"
        );
    }

    #[test]
    fn test_decode_error_is_transparent() {
        let err: MonitorError = DecodeError::LengthMismatch {
            expected: 64,
            actual: 12,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "packet length mismatch: expected 64 bytes, got 12"
        );
    }
}
