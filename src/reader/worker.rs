//! Background read worker.
//!
//! A worker is one dedicated OS thread running a timeout-polled read loop
//! against a registered driver: block for a single byte, then drain whatever
//! else the receive buffer already holds into the same chunk. Everything the
//! worker observes crosses back to the stream as a `ReadEvent`; the worker
//! itself never ends the stream.

use super::error::ReadError;
use crate::driver::{DriverError, SerialDriver};
use crate::registry::{self, PortToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// One delivery from the worker to the stream.
#[derive(Debug)]
pub(crate) enum ReadEvent {
    /// Bytes read from the port, in arrival order. Never empty.
    Chunk(Vec<u8>),
    /// A fault the consumer should see. The worker keeps reading.
    Failure(ReadError),
}

/// Everything a worker needs, assembled fresh for each start.
pub(crate) struct WorkerArgs {
    pub port: PortToken,
    pub timeout: Duration,
    pub events: UnboundedSender<ReadEvent>,
    pub stop: Arc<AtomicBool>,
}

/// Spawn the read loop on a named OS thread. The handle is not joined
/// anywhere; workers are detached and exit on their own.
pub(crate) fn spawn(args: WorkerArgs) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("serial-reader-{}", args.port))
        .spawn(move || read_loop(args))
}

/// The timeout-polled read loop.
///
/// Exits when the port closes, the stop flag is raised, or the receiving
/// side of the channel goes away. A clean read timeout just polls again.
pub(crate) fn read_loop(args: WorkerArgs) {
    let WorkerArgs {
        port,
        timeout,
        events,
        stop,
    } = args;

    let Some(driver) = registry::resolve(port) else {
        warn!(%port, "read worker started with unknown port token");
        let _ = events.send(ReadEvent::Failure(ReadError::UnknownPort(port)));
        return;
    };

    debug!(%port, ?timeout, "read worker started");

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let mut guard = driver.lock();
        if !guard.is_open() {
            debug!(%port, "port closed, read worker exiting");
            break;
        }

        // Block up to the timeout for the first byte of a burst.
        let mut first = [0u8; 1];
        let event = match guard.read(&mut first, timeout) {
            Ok(0) => None,
            Ok(_) => Some(drain_burst(&mut *guard, first[0], timeout)),
            Err(e) => Some(ReadEvent::Failure(e.into())),
        };
        drop(guard);

        let Some(event) = event else {
            continue;
        };

        if let ReadEvent::Failure(e) = &event {
            // A port that closed under us is normal teardown, not a fault.
            if matches!(e, ReadError::Driver(DriverError::NotOpen)) {
                debug!(%port, "port closed during read, worker exiting");
                break;
            }
            debug!(%port, error = %e, "forwarding read failure");
        }

        if events.send(event).is_err() {
            // Receiver gone; nobody is listening anymore.
            break;
        }
    }

    debug!(%port, "read worker stopped");
}

/// Assemble one chunk from the first byte plus whatever the driver reports
/// as already buffered. An over-report surfaces as a short-read failure and
/// the bytes that did arrive are discarded with it.
fn drain_burst(driver: &mut dyn SerialDriver, first: u8, timeout: Duration) -> ReadEvent {
    let available = match driver.bytes_available() {
        Ok(n) => n,
        Err(e) => return ReadEvent::Failure(e.into()),
    };

    if available == 0 {
        return ReadEvent::Chunk(vec![first]);
    }

    let mut chunk = vec![0u8; available + 1];
    chunk[0] = first;
    match driver.read(&mut chunk[1..], timeout) {
        Ok(n) if n == available => ReadEvent::Chunk(chunk),
        Ok(n) => ReadEvent::Failure(ReadError::ShortRead {
            expected: available,
            actual: n,
        }),
        Err(e) => ReadEvent::Failure(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use std::time::Instant;
    use tokio::sync::mpsc;

    fn start_loop(
        port: PortToken,
        timeout_ms: u64,
    ) -> (
        mpsc::UnboundedReceiver<ReadEvent>,
        Arc<AtomicBool>,
        std::thread::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let args = WorkerArgs {
            port,
            timeout: Duration::from_millis(timeout_ms),
            events: tx,
            stop: Arc::clone(&stop),
        };
        let handle = std::thread::spawn(move || read_loop(args));
        (rx, stop, handle)
    }

    #[test]
    fn test_burst_becomes_single_chunk() {
        let mock = MockDriver::new("MOCK-BURST");
        mock.push_bytes(&[0x41, 0x42, 0x43]);
        let port = registry::register(mock.clone());

        let (mut rx, _stop, handle) = start_loop(port, 50);

        match rx.blocking_recv() {
            Some(ReadEvent::Chunk(bytes)) => assert_eq!(bytes, vec![0x41, 0x42, 0x43]),
            other => panic!("Expected one chunk, got: {:?}", other),
        }

        mock.close_port();
        handle.join().unwrap();
        registry::deregister(port);
    }

    #[test]
    fn test_lone_byte_chunk() {
        let mock = MockDriver::new("MOCK-LONE");
        mock.push_bytes(b"X");
        let port = registry::register(mock.clone());

        let (mut rx, _stop, handle) = start_loop(port, 50);

        match rx.blocking_recv() {
            Some(ReadEvent::Chunk(bytes)) => assert_eq!(bytes, b"X".to_vec()),
            other => panic!("Expected one chunk, got: {:?}", other),
        }

        mock.close_port();
        handle.join().unwrap();
        registry::deregister(port);
    }

    #[test]
    fn test_short_read_failure_then_recovery() {
        let mock = MockDriver::new("MOCK-SHORT");
        mock.push_bytes(b"ab");
        mock.force_available_once(5);
        let port = registry::register(mock.clone());

        let (mut rx, _stop, handle) = start_loop(port, 50);

        match rx.blocking_recv() {
            Some(ReadEvent::Failure(ReadError::ShortRead { expected, actual })) => {
                assert_eq!(expected, 5);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected short-read failure, got: {:?}", other),
        }

        // The loop keeps reading after the failure.
        mock.push_bytes(b"cd");
        match rx.blocking_recv() {
            Some(ReadEvent::Chunk(bytes)) => assert_eq!(bytes, b"cd".to_vec()),
            other => panic!("Expected recovery chunk, got: {:?}", other),
        }

        mock.close_port();
        handle.join().unwrap();
        registry::deregister(port);
    }

    #[test]
    fn test_driver_fault_forwarded_non_fatal() {
        let mock = MockDriver::new("MOCK-FAULT");
        mock.fail_next_read();
        let port = registry::register(mock.clone());

        let (mut rx, _stop, handle) = start_loop(port, 50);

        match rx.blocking_recv() {
            Some(ReadEvent::Failure(ReadError::Driver(DriverError::Io(_)))) => {}
            other => panic!("Expected driver failure, got: {:?}", other),
        }

        mock.push_bytes(b"ok");
        match rx.blocking_recv() {
            Some(ReadEvent::Chunk(bytes)) => assert_eq!(bytes, b"ok".to_vec()),
            other => panic!("Expected chunk after fault, got: {:?}", other),
        }

        mock.close_port();
        handle.join().unwrap();
        registry::deregister(port);
    }

    #[test]
    fn test_port_close_exits_quietly() {
        let mock = MockDriver::new("MOCK-EXIT");
        let port = registry::register(mock.clone());

        let (mut rx, _stop, handle) = start_loop(port, 1_000);

        // Close while the worker is blocked mid-read; no failure crosses
        // the channel, the loop just ends.
        std::thread::sleep(Duration::from_millis(20));
        mock.close_port();
        handle.join().unwrap();

        assert!(rx.blocking_recv().is_none());
        registry::deregister(port);
    }

    #[test]
    fn test_unknown_token_surfaces_failure() {
        let mock = MockDriver::new("MOCK-STALE");
        let port = registry::register(mock);
        registry::deregister(port);

        let (mut rx, _stop, handle) = start_loop(port, 50);
        handle.join().unwrap();

        match rx.blocking_recv() {
            Some(ReadEvent::Failure(ReadError::UnknownPort(p))) => assert_eq!(p, port),
            other => panic!("Expected unknown-port failure, got: {:?}", other),
        }
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_stop_flag_exit_bounded_by_timeout() {
        let mock = MockDriver::new("MOCK-STOP");
        let port = registry::register(mock);

        let (_rx, stop, handle) = start_loop(port, 25);

        std::thread::sleep(Duration::from_millis(10));
        stop.store(true, Ordering::Relaxed);

        let start = Instant::now();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_millis(250));
        registry::deregister(port);
    }

    #[test]
    fn test_closed_channel_stops_worker() {
        let mock = MockDriver::new("MOCK-NOSUB");
        let port = registry::register(mock.clone());

        let (rx, _stop, handle) = start_loop(port, 25);
        drop(rx);

        // The next delivery attempt notices the closed channel and exits.
        mock.push_bytes(b"undeliverable");
        handle.join().unwrap();
        registry::deregister(port);
    }
}
