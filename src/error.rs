//! Custom error types for the device layer.
//!
//! This module defines `DeviceError`, the single error type returned by every
//! device, signal and registry operation. Using the `thiserror` crate, it gives
//! a consistent way to report the few failure classes this layer knows about.
//!
//! ## Error Hierarchy
//!
//! - **`PositionNotCached`**: `resume_position()` was called on a motor bundle
//!   that never cached its positions. This is the only error raised purely by
//!   local logic; everything else comes from the control-system client.
//! - **`Channel`** / **`UnknownChannel`**: The client failed to read or write a
//!   process variable, or the PV does not exist.
//! - **`ReadOnly`** / **`TypeMismatch`**: A write to a read-only signal, or a
//!   value that cannot be interpreted as the requested type.
//! - **`LimitViolation`**: A motor move outside the soft limits.
//! - **`Timeout`** / **`TaskFailed`**: Waiting on an in-flight operation failed.
//! - **`Configuration`**, **`DuplicateDevice`**, **`UnknownDevice`**: Problems
//!   building devices from the instrument configuration.
//! - **`Unsupported`**: A device was asked for an operation it does not offer.

use thiserror::Error;

/// Convenience alias for results using the device error type.
pub type AppResult<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Cannot resume '{0}'. Must first call 'cache_position()'")]
    PositionNotCached(String),

    #[error("Channel '{pv}' error: {message}")]
    Channel { pv: String, message: String },

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("Channel '{0}' is read-only")]
    ReadOnly(String),

    #[error("Channel '{pv}' holds {found}, expected {expected}")]
    TypeMismatch {
        pv: String,
        expected: &'static str,
        found: String,
    },

    #[error("Target {target} for '{motor}' outside limits [{low}, {high}]")]
    LimitViolation {
        motor: String,
        target: f64,
        low: f64,
        high: f64,
    },

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),

    #[error("Operation '{0}' failed to complete: {1}")]
    TaskFailed(String, String),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Device '{0}' is already registered")]
    DuplicateDevice(String),

    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

impl DeviceError {
    /// Shorthand for a client-side failure on `pv`.
    pub fn channel(pv: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceError::Channel {
            pv: pv.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeviceError::PositionNotCached("tomostage".to_string());
        assert_eq!(
            err.to_string(),
            "Cannot resume 'tomostage'. Must first call 'cache_position()'"
        );
    }

    #[test]
    fn test_channel_error_display() {
        let err = DeviceError::channel("6idhedm:m48.VAL", "disconnected");
        assert_eq!(err.to_string(), "Channel '6idhedm:m48.VAL' error: disconnected");
    }
}
