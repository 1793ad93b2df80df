//! Stream controller and reader facade.
//!
//! `SerialPortReader` owns the lifecycle; `ChunkStream` is the consumable
//! view of it. The first poll of the stream starts a read worker, pause and
//! cancel tear it down, resume starts a fresh one. Teardown always closes
//! the consumer end of the channel before signalling the worker, so nothing
//! can be delivered past it.

use super::error::ReadError;
use super::worker::{self, ReadEvent, WorkerArgs};
use super::DEFAULT_READ_TIMEOUT;
use crate::registry::PortToken;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

/// Channel and controls for one live worker.
struct WorkerLink {
    rx: UnboundedReceiver<ReadEvent>,
    stop: Arc<AtomicBool>,
}

/// Lifecycle of the subscription.
enum Phase {
    /// No worker; the next poll starts one.
    Idle,
    /// A worker is reading and delivering.
    Reading(WorkerLink),
    /// No worker; polls park until `resume` or `close`.
    Paused,
    /// Terminal. The stream yields end-of-stream forever.
    Closed,
}

struct Inner {
    phase: Phase,
    /// Waker of the most recent poll, woken on lifecycle transitions.
    waker: Option<Waker>,
}

impl Inner {
    fn take_worker(&mut self) -> Option<WorkerLink> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Reading(link) => Some(link),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Tear down the current worker, if any. The receiver is closed before
    /// the stop flag is raised so an in-flight send cannot land afterwards;
    /// the worker thread itself is detached and unwinds within one read
    /// timeout.
    fn stop_worker(&mut self) {
        if let Some(mut link) = self.take_worker() {
            link.rx.close();
            link.stop.store(true, Ordering::Relaxed);
        }
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

struct ReaderShared {
    port: PortToken,
    timeout: Duration,
    inner: Mutex<Inner>,
}

/// Start a fresh worker and hand back its link. A spawn failure is pushed
/// into the channel as the stream's next item; the reader itself survives.
fn start_worker(port: PortToken, timeout: Duration) -> WorkerLink {
    let (tx, rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let args = WorkerArgs {
        port,
        timeout,
        events: tx.clone(),
        stop: Arc::clone(&stop),
    };

    if let Err(e) = worker::spawn(args) {
        warn!(%port, error = %e, "failed to spawn read worker");
        let _ = tx.send(ReadEvent::Failure(ReadError::Spawn(e)));
    }

    WorkerLink { rx, stop }
}

/// Asynchronous chunked reader over a registered serial driver.
///
/// Construction is cheap and infallible; the driver is only resolved when
/// the stream is first polled and a worker starts. Reads happen on a
/// dedicated background thread, so the async runtime never blocks.
///
/// # Example
/// ```
/// use serial_stream::driver::MockDriver;
/// use serial_stream::reader::SerialPortReader;
/// use serial_stream::registry;
/// use futures::StreamExt;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let driver = MockDriver::new("MOCK0");
/// driver.push_bytes(b"hello");
/// let port = registry::register(driver);
///
/// let reader = SerialPortReader::new(port);
/// let mut stream = reader.stream();
///
/// let chunk = stream.next().await.unwrap().unwrap();
/// assert_eq!(chunk, b"hello");
/// reader.close();
/// # });
/// ```
pub struct SerialPortReader {
    shared: Arc<ReaderShared>,
}

impl SerialPortReader {
    /// Create a reader over the given port with the default read timeout.
    pub fn new(port: PortToken) -> Self {
        Self::with_timeout(port, DEFAULT_READ_TIMEOUT)
    }

    /// Create a reader with an explicit read timeout. The timeout bounds a
    /// single blocking read attempt, which is also how long teardown can
    /// lag behind a pause or close.
    pub fn with_timeout(port: PortToken, timeout: Duration) -> Self {
        Self {
            shared: Arc::new(ReaderShared {
                port,
                timeout,
                inner: Mutex::new(Inner {
                    phase: Phase::Idle,
                    waker: None,
                }),
            }),
        }
    }

    /// The token of the port this reader reads from.
    pub fn port(&self) -> PortToken {
        self.shared.port
    }

    /// The configured read timeout.
    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// The chunk stream for this reader.
    ///
    /// The reader carries one logical subscription and every stream
    /// returned here views it. Poll one stream at a time; dropping it
    /// cancels the subscription and a later stream may listen anew.
    pub fn stream(&self) -> ChunkStream {
        ChunkStream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop reading without ending the stream. The worker is torn down and
    /// a consumer blocked on the stream parks until `resume` or `close`.
    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock();
        if matches!(inner.phase, Phase::Reading(_)) {
            debug!(port = %self.shared.port, "pausing reader");
            inner.stop_worker();
            inner.phase = Phase::Paused;
        }
    }

    /// Resume reading after a pause.
    ///
    /// Always starts from a clean worker: any live one is torn down first,
    /// even if no pause intervened since the last start. Has no effect on a
    /// reader that was never polled or is closed.
    pub fn resume(&self) {
        let mut inner = self.shared.inner.lock();
        match inner.phase {
            Phase::Reading(_) | Phase::Paused => {
                debug!(port = %self.shared.port, "resuming reader");
                inner.stop_worker();
                inner.phase = Phase::Reading(start_worker(self.shared.port, self.shared.timeout));
                inner.wake();
            }
            Phase::Idle | Phase::Closed => {}
        }
    }

    /// Close the reader. Idempotent and terminal: the worker is torn down,
    /// the stream ends, and nothing is ever delivered again. Data still in
    /// flight is discarded, not flushed.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        if matches!(inner.phase, Phase::Closed) {
            return;
        }
        debug!(port = %self.shared.port, "closing reader");
        inner.stop_worker();
        inner.phase = Phase::Closed;
        inner.wake();
    }
}

impl std::fmt::Debug for SerialPortReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortReader")
            .field("port", &self.shared.port)
            .field("timeout", &self.shared.timeout)
            .finish()
    }
}

/// Stream of chunks read from a serial port.
///
/// Yields `Ok(bytes)` for each chunk and `Err(..)` for faults the worker
/// observed; errors do not end the stream. The stream ends (yields `None`)
/// only after [`SerialPortReader::close`]. When the port itself closes, the
/// stream stays open and simply parks.
pub struct ChunkStream {
    shared: Arc<ReaderShared>,
}

impl Stream for ChunkStream {
    type Item = Result<Vec<u8>, ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        inner.waker = Some(cx.waker().clone());

        loop {
            match &mut inner.phase {
                Phase::Closed => return Poll::Ready(None),
                Phase::Paused => return Poll::Pending,
                Phase::Idle => {
                    // Listen: the first poll starts the worker.
                    debug!(port = %shared.port, "stream polled, starting read worker");
                    inner.phase = Phase::Reading(start_worker(shared.port, shared.timeout));
                }
                Phase::Reading(link) => {
                    return match link.rx.poll_recv(cx) {
                        Poll::Ready(Some(ReadEvent::Chunk(bytes))) => Poll::Ready(Some(Ok(bytes))),
                        Poll::Ready(Some(ReadEvent::Failure(e))) => Poll::Ready(Some(Err(e))),
                        // Worker exited on its own (port closed, spawn
                        // failed). The stream stays open; a lifecycle call
                        // wakes us.
                        Poll::Ready(None) => Poll::Pending,
                        Poll::Pending => Poll::Pending,
                    };
                }
            }
        }
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        match inner.phase {
            // Cancel: back to idle, a later stream may listen again.
            Phase::Reading(_) => {
                debug!(port = %self.shared.port, "stream dropped, cancelling read worker");
                inner.stop_worker();
            }
            Phase::Paused => inner.phase = Phase::Idle,
            Phase::Idle | Phase::Closed => {}
        }
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("port", &self.shared.port)
            .finish()
    }
}
