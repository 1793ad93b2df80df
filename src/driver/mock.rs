//! Mock serial driver for testing.
//!
//! Provides a `MockDriver` that simulates a blocking serial port without
//! hardware. Reads genuinely park the calling thread on a condition variable
//! until data is pushed, the port is closed, or the timeout expires, so
//! worker-thread timing behaves the same as against a real port.

use super::error::DriverError;
use super::traits::SerialDriver;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inner state of the mock driver, shared by all clones.
#[derive(Debug)]
struct MockState {
    /// Bytes waiting to be read.
    read_queue: VecDeque<u8>,
    /// Whether the simulated port is open.
    open: bool,
    /// One-shot override for the next `bytes_available` query.
    available_override: Option<usize>,
    /// When set, the next read fails with an injected I/O error.
    fail_next_read: bool,
    /// Total number of `read` calls observed.
    read_calls: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            read_queue: VecDeque::new(),
            open: true,
            available_override: None,
            fail_next_read: false,
            read_calls: 0,
        }
    }
}

/// Mock serial driver for testing.
///
/// Clones share state, so a test can keep one handle while the reader
/// subsystem owns another and feed data or close the port mid-read:
///
/// # Example
/// ```
/// use serial_stream::driver::{MockDriver, SerialDriver};
/// use std::time::Duration;
///
/// let mut driver = MockDriver::new("MOCK0");
/// driver.push_bytes(b"Hello");
///
/// let mut buffer = [0u8; 8];
/// let n = driver.read(&mut buffer, Duration::from_millis(10)).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
/// ```
#[derive(Clone)]
pub struct MockDriver {
    /// The port name/identifier.
    name: String,
    /// Shared state plus the condvar that parks blocked readers.
    state: Arc<(Mutex<MockState>, Condvar)>,
}

impl MockDriver {
    /// Create a new mock driver with the given name. The port starts open.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new((Mutex::new(MockState::default()), Condvar::new())),
        }
    }

    /// Append bytes to the read queue and wake any blocked reader.
    pub fn push_bytes(&self, data: &[u8]) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        state.read_queue.extend(data);
        cvar.notify_all();
    }

    /// Make the next `bytes_available` query report `n` regardless of the
    /// queue contents. One-shot; later queries are honest again.
    pub fn force_available_once(&self, n: usize) {
        let (lock, _) = &*self.state;
        lock.lock().available_override = Some(n);
    }

    /// Make the next read fail with an I/O error, waking a blocked reader.
    pub fn fail_next_read(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().fail_next_read = true;
        cvar.notify_all();
    }

    /// Close the simulated port out-of-band, waking any blocked reader.
    pub fn close_port(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().open = false;
        cvar.notify_all();
    }

    /// Number of bytes still queued for reading.
    pub fn remaining(&self) -> usize {
        let (lock, _) = &*self.state;
        lock.lock().read_queue.len()
    }

    /// Total number of `read` calls made against this driver.
    pub fn read_calls(&self) -> u64 {
        let (lock, _) = &*self.state;
        lock.lock().read_calls
    }
}

impl SerialDriver for MockDriver {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, DriverError> {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        state.read_calls += 1;

        let deadline = Instant::now() + timeout;
        loop {
            if !state.open {
                return Err(DriverError::NotOpen);
            }
            if state.fail_next_read {
                state.fail_next_read = false;
                return Err(DriverError::Io(std::io::Error::other(
                    "injected read fault",
                )));
            }
            if !state.read_queue.is_empty() {
                break;
            }
            if cvar.wait_until(&mut state, deadline).timed_out() {
                // Clean timeout with nothing received.
                return Ok(0);
            }
        }

        let mut bytes_read = 0;
        for slot in buf.iter_mut() {
            match state.read_queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    bytes_read += 1;
                }
                None => break,
            }
        }
        Ok(bytes_read)
    }

    fn bytes_available(&self) -> Result<usize, DriverError> {
        let (lock, _) = &*self.state;
        let mut state = lock.lock();
        if !state.open {
            return Err(DriverError::NotOpen);
        }
        match state.available_override.take() {
            Some(n) => Ok(n),
            None => Ok(state.read_queue.len()),
        }
    }

    fn is_open(&self) -> bool {
        let (lock, _) = &*self.state;
        lock.lock().open
    }

    fn close(&mut self) {
        self.close_port();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("name", &self.name)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read() {
        let mut driver = MockDriver::new("MOCK0");
        driver.push_bytes(b"Hello");

        let mut buffer = [0u8; 10];
        let n = driver.read(&mut buffer, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_read_times_out_empty() {
        let mut driver = MockDriver::new("MOCK0");

        let start = Instant::now();
        let mut buffer = [0u8; 1];
        let n = driver.read(&mut buffer, Duration::from_millis(50)).unwrap();

        assert_eq!(n, 0);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_read_unblocks_on_push() {
        let driver = MockDriver::new("MOCK0");
        let feeder = driver.clone();

        let handle = std::thread::spawn(move || {
            let mut driver = driver;
            let mut buffer = [0u8; 4];
            let n = driver.read(&mut buffer, Duration::from_secs(5)).unwrap();
            buffer[..n].to_vec()
        });

        std::thread::sleep(Duration::from_millis(20));
        feeder.push_bytes(b"ping");

        let got = handle.join().unwrap();
        assert_eq!(got, b"ping");
    }

    #[test]
    fn test_read_unblocks_on_close() {
        let driver = MockDriver::new("MOCK0");
        let closer = driver.clone();

        let handle = std::thread::spawn(move || {
            let mut driver = driver;
            let mut buffer = [0u8; 1];
            driver.read(&mut buffer, Duration::from_secs(5))
        });

        std::thread::sleep(Duration::from_millis(20));
        closer.close_port();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(DriverError::NotOpen)));
    }

    #[test]
    fn test_available_override_is_one_shot() {
        let driver = MockDriver::new("MOCK0");
        driver.push_bytes(b"ab");
        driver.force_available_once(10);

        assert_eq!(driver.bytes_available().unwrap(), 10);
        assert_eq!(driver.bytes_available().unwrap(), 2);
    }

    #[test]
    fn test_injected_read_fault() {
        let mut driver = MockDriver::new("MOCK0");
        driver.fail_next_read();

        let mut buffer = [0u8; 1];
        let result = driver.read(&mut buffer, Duration::from_millis(10));
        assert!(matches!(result, Err(DriverError::Io(_))));

        // Fault is one-shot; the driver reads normally afterwards.
        driver.push_bytes(b"x");
        let n = driver.read(&mut buffer, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_read_call_counting() {
        let mut driver = MockDriver::new("MOCK0");
        assert_eq!(driver.read_calls(), 0);

        let mut buffer = [0u8; 1];
        let _ = driver.read(&mut buffer, Duration::from_millis(1));
        let _ = driver.read(&mut buffer, Duration::from_millis(1));
        assert_eq!(driver.read_calls(), 2);
    }
}
