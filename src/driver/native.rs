//! Native serial driver implementation.
//!
//! Wraps the `serialport` crate behind the `SerialDriver` trait. Timeouts are
//! folded into the read result: a read that expires with nothing received
//! reports `Ok(0)` rather than an error, which is what the polling read loop
//! expects.

use super::error::DriverError;
use super::traits::SerialDriver;
use std::io::Read;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// Serial driver backed by a real OS port.
pub struct NativeDriver {
    /// The underlying serial port; `None` once closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
    /// Timeout currently configured on the port, to skip redundant syscalls.
    timeout: Duration,
    /// Descriptor captured at open time, cleared on close.
    #[cfg(unix)]
    fd: Option<RawFd>,
}

impl NativeDriver {
    /// Open a serial port at the given path and baud rate.
    ///
    /// Line settings stay at the platform defaults (8N1, no flow control);
    /// this driver exists to be read from, not configured.
    ///
    /// # Example
    /// ```no_run
    /// use serial_stream::driver::NativeDriver;
    ///
    /// let driver = NativeDriver::open("/dev/ttyUSB0", 115_200)?;
    /// # Ok::<(), serial_stream::driver::DriverError>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, DriverError> {
        let builder = serialport::new(path, baud_rate);

        #[cfg(unix)]
        {
            let port = builder.open_native().map_err(|e| Self::open_error(path, e))?;
            let fd = port.as_raw_fd();
            Ok(Self {
                port: Some(Box::new(port)),
                name: path.to_string(),
                // serialport's builder default; updated on first read.
                timeout: Duration::ZERO,
                fd: Some(fd),
            })
        }

        #[cfg(not(unix))]
        {
            let port = builder.open().map_err(|e| Self::open_error(path, e))?;
            Ok(Self {
                port: Some(port),
                name: path.to_string(),
                timeout: Duration::ZERO,
            })
        }
    }

    fn open_error(path: &str, e: serialport::Error) -> DriverError {
        match e.kind() {
            serialport::ErrorKind::NoDevice => DriverError::not_found(path),
            _ => DriverError::Serial(e),
        }
    }
}

impl SerialDriver for NativeDriver {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, DriverError> {
        let port = self.port.as_mut().ok_or(DriverError::NotOpen)?;

        if timeout != self.timeout {
            port.set_timeout(timeout)?;
            self.timeout = timeout;
        }

        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn bytes_available(&self) -> Result<usize, DriverError> {
        let port = self.port.as_ref().ok_or(DriverError::NotOpen)?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        // Dropping the boxed port releases the descriptor.
        self.port = None;
        #[cfg(unix)]
        {
            self.fd = None;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        self.fd
    }
}

impl std::fmt::Debug for NativeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeDriver")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_port() {
        let result = NativeDriver::open("/dev/nonexistent_port_12345", 9600);

        assert!(result.is_err());
        if let Err(e) = result {
            match e {
                DriverError::NotFound(name) => {
                    assert!(name.contains("nonexistent"));
                }
                // Some platforms report a permission or IO error instead.
                DriverError::Serial(_) | DriverError::Io(_) => {}
                other => panic!("Unexpected error: {:?}", other),
            }
        }
    }

    // Requires a loopback device on the bench; run with
    // `cargo test --features hardware-tests`.
    #[cfg(feature = "hardware-tests")]
    #[test]
    fn test_open_real_port() {
        let mut driver = NativeDriver::open("/dev/ttyUSB0", 115_200).unwrap();
        assert!(driver.is_open());
        assert_eq!(driver.name(), "/dev/ttyUSB0");

        driver.close();
        assert!(!driver.is_open());
    }
}
