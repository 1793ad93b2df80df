//! Reader-level error types.
//!
//! Failures observed by the read worker cross the channel as ordinary
//! stream items. None of them end the stream; delivery continues with the
//! next chunk.

use crate::driver::DriverError;
use crate::registry::PortToken;
use thiserror::Error;

/// Errors delivered as items by a chunk stream.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The follow-up read returned fewer bytes than the receive buffer
    /// reported available.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes the driver reported as buffered.
        expected: usize,
        /// Bytes the read actually produced.
        actual: usize,
    },

    /// The driver failed during a read or a buffer query.
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// The background read worker could not be spawned.
    #[error("Failed to spawn read worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The token no longer resolves to a registered driver.
    #[error("Unknown port: {0}")]
    UnknownPort(PortToken),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_display() {
        let err = ReadError::ShortRead {
            expected: 12,
            actual: 7,
        };
        assert_eq!(err.to_string(), "Short read: expected 12 bytes, got 7");
    }

    #[test]
    fn test_driver_error_conversion() {
        let err: ReadError = DriverError::NotOpen.into();
        assert_eq!(err.to_string(), "Driver error: Port is not open");
    }
}
