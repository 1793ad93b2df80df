//! OS-level readiness waiting for serial descriptors.
//!
//! An `EventSet` parks the calling thread in `poll(2)` until the port's
//! descriptor reports a subscribed condition, the timeout expires, or an
//! `EventWaker` fires. It is a reusable building block for a readiness
//! driven read loop; the worker's timeout-polled loop does not use it.
//!
//! The set owns a wake pipe whose descriptors are released exactly once,
//! through `Drop`, even when registration fails partway.

use crate::driver::{DriverError, SerialDriver};
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Conditions an event set can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u8);

impl EventMask {
    /// Data is waiting in the receive buffer.
    pub const RX_READY: EventMask = EventMask(0b01);
    /// The descriptor is in an error or hang-up state.
    pub const ERROR: EventMask = EventMask(0b10);

    /// Whether every condition in `other` is present in `self`.
    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    fn poll_events(self) -> libc::c_short {
        let mut events = 0;
        if self.contains(Self::RX_READY) {
            events |= libc::POLLIN;
        }
        if self.contains(Self::ERROR) {
            events |= libc::POLLERR;
        }
        events
    }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// What a wait observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// The port has data to read.
    pub read_ready: bool,
    /// The port descriptor reported an error or hang-up.
    pub error: bool,
    /// An `EventWaker` interrupted the wait.
    pub woken: bool,
}

impl Readiness {
    /// Whether anything at all was observed (a plain timeout reports nothing).
    pub fn any(self) -> bool {
        self.read_ready || self.error || self.woken
    }
}

/// Write end of the wake pipe, shared by all wakers of one set.
#[derive(Debug)]
struct WakePipe {
    fd: RawFd,
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Handle that interrupts a pending [`EventSet::wait`] from another thread.
#[derive(Debug, Clone)]
pub struct EventWaker {
    pipe: Arc<WakePipe>,
}

impl EventWaker {
    /// Interrupt the wait. Waking a set that is not currently waiting makes
    /// the next wait return immediately; waking a released set is a no-op.
    pub fn wake(&self) {
        let byte = 1u8;
        // A full pipe (EAGAIN) means a wake is already pending; a closed
        // read end (EPIPE) means the set is gone. Both are fine.
        let _ = unsafe { libc::write(self.pipe.fd, &byte as *const u8 as *const libc::c_void, 1) };
    }
}

/// Blocking waiter over a serial driver's raw descriptor.
#[derive(Debug)]
pub struct EventSet {
    /// The port's descriptor. Borrowed; closing it is the driver's business.
    fd: RawFd,
    /// Read end of the wake pipe. Ours to close.
    wake_rx: RawFd,
    wake_tx: Arc<WakePipe>,
    mask: EventMask,
}

impl EventSet {
    /// Build a waiter over the driver's descriptor for the given conditions.
    ///
    /// Fails with `Unsupported` when the driver has no OS descriptor to
    /// poll (the mock driver, for one).
    pub fn register(driver: &dyn SerialDriver, mask: EventMask) -> Result<EventSet, DriverError> {
        let fd = driver.raw_fd().ok_or_else(|| {
            DriverError::unsupported(format!(
                "event sets need a raw descriptor, {} has none",
                driver.name()
            ))
        })?;

        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(DriverError::Io(std::io::Error::last_os_error()));
        }
        let (wake_rx, wake_tx) = (fds[0], fds[1]);

        if let Err(e) = set_nonblocking(wake_rx).and_then(|()| set_nonblocking(wake_tx)) {
            unsafe {
                libc::close(wake_rx);
                libc::close(wake_tx);
            }
            return Err(DriverError::Io(e));
        }

        Ok(EventSet {
            fd,
            wake_rx,
            wake_tx: Arc::new(WakePipe { fd: wake_tx }),
            mask,
        })
    }

    /// A waker for this set. Wakers are cheap to clone and may outlive the
    /// set itself.
    pub fn waker(&self) -> EventWaker {
        EventWaker {
            pipe: Arc::clone(&self.wake_tx),
        }
    }

    /// Block until a subscribed condition is reported, a waker fires, or
    /// the timeout expires. A timeout reports empty readiness.
    pub fn wait(&mut self, timeout: Duration) -> Result<Readiness, DriverError> {
        let mut fds = [
            libc::pollfd {
                fd: self.fd,
                events: self.mask.poll_events(),
                revents: 0,
            },
            libc::pollfd {
                fd: self.wake_rx,
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            // A signal cut the wait short; report it like a timeout.
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(Readiness::default());
            }
            return Err(DriverError::Io(err));
        }

        let port = fds[0].revents;
        let woken = fds[1].revents & libc::POLLIN != 0;
        if woken {
            self.drain_wake();
        }

        Ok(Readiness {
            read_ready: port & libc::POLLIN != 0,
            error: port & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0,
            woken,
        })
    }

    /// Swallow pending wake bytes so one wake means one interrupted wait.
    fn drain_wake(&self) {
        let mut buf = [0u8; 16];
        loop {
            let n = unsafe {
                libc::read(
                    self.wake_rx,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }
}

impl Drop for EventSet {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_rx);
        }
    }
}

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
