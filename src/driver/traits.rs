//! Core trait for serial driver abstraction.
//!
//! Defines the `SerialDriver` trait that allows both real serial ports and
//! mock implementations to be used interchangeably by the reader subsystem.

use super::error::DriverError;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Trait for blocking serial I/O as consumed by the read worker.
///
/// This trait abstracts over a synchronous, byte-oriented serial port. The
/// read worker drives it from a dedicated OS thread; implementations must be
/// safe to hand across threads behind a lock but are never shared without
/// one, hence `&mut self` on the blocking call.
pub trait SerialDriver: Send + std::fmt::Debug {
    /// Blocking read into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes actually read. A timeout with no data is
    /// not an error: implementations return `Ok(0)` so callers can
    /// distinguish "nothing arrived" from a real fault.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, DriverError>;

    /// Number of bytes currently queued in the receive buffer.
    ///
    /// Non-blocking. Used to size the follow-up read after a first byte
    /// arrives; an over-report here shows up as a short read there.
    fn bytes_available(&self) -> Result<usize, DriverError>;

    /// Whether the port is still open. Non-blocking; the worker's loop gate.
    fn is_open(&self) -> bool;

    /// Close the port. Further reads fail; `is_open` reports false.
    fn close(&mut self);

    /// Get the name/path of this port for identification.
    fn name(&self) -> &str;

    /// The raw file descriptor backing this driver (if any).
    ///
    /// Returns `None` when the driver has no OS-level descriptor, in which
    /// case event-set waiting is unavailable for it.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}
