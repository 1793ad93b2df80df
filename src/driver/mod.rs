//! Driver abstraction layer for serial ports.
//!
//! Provides the blocking `SerialDriver` trait consumed by the reader
//! subsystem, a native implementation over real hardware, and a mock for
//! testing without a device.

pub mod error;
pub mod mock;
pub mod native;
pub mod traits;

pub use error::DriverError;
pub use mock::MockDriver;
pub use native::NativeDriver;
pub use traits::*;
