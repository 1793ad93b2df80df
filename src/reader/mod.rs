//! Asynchronous reader subsystem.
//!
//! Bridges the blocking `SerialDriver` boundary to an async chunk stream.
//! A dedicated worker thread polls the port with a bounded blocking read
//! and forwards chunks over a channel; the stream side owns the worker's
//! lifecycle and never blocks the runtime.

pub mod error;
mod stream;
mod worker;

pub use error::ReadError;
pub use stream::{ChunkStream, SerialPortReader};

use std::time::Duration;

/// Read timeout applied when a reader is constructed without one.
///
/// Bounds one blocking read attempt; it is the poll cadence on a silent
/// port and the worst-case lag of worker teardown.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
