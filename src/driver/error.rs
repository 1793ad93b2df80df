//! Driver-level error types.
//!
//! Defines error types for serial driver operations, kept separate from the
//! reader subsystem's errors so driver implementations stay self-contained.

use thiserror::Error;

/// Errors that can occur during serial driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during driver operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The driver does not support the requested capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl DriverError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = DriverError::unsupported("event sets need a descriptor");
        assert_eq!(
            err.to_string(),
            "Unsupported operation: event sets need a descriptor"
        );

        let err = DriverError::NotOpen;
        assert_eq!(err.to_string(), "Port is not open");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err: DriverError = io_err.into();
        assert!(matches!(err, DriverError::Io(_)));
    }
}
