//! Serial Stream Library
//!
//! This library bridges blocking, byte-oriented serial ports to asynchronous
//! chunked data streams. Reads happen on a dedicated worker thread with a
//! bounded blocking timeout; chunks cross to the async side over a channel,
//! so no byte is lost and no runtime thread ever blocks or spins.
//!
//! # Modules
//!
//! - `driver`: Blocking serial driver trait, native and mock implementations
//! - `registry`: Process-global token registry for handing ports to workers
//! - `reader`: The reader facade, chunk stream, and background read worker
//! - `wait`: OS-level readiness waiting over raw descriptors (Unix only)

pub mod driver;
pub mod reader;
pub mod registry;

#[cfg(unix)]
pub mod wait;

// Re-export commonly used types for convenience
pub use driver::{DriverError, MockDriver, NativeDriver, SerialDriver};
pub use reader::{ChunkStream, ReadError, SerialPortReader, DEFAULT_READ_TIMEOUT};
pub use registry::PortToken;

#[cfg(unix)]
pub use wait::{EventMask, EventSet, EventWaker, Readiness};
