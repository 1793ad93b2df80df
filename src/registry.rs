//! Process-global registry of open serial drivers.
//!
//! The read worker runs on its own OS thread and is handed only a copyable
//! `PortToken`; it resolves the token here into its own shared handle. No
//! live driver object ever crosses the spawn boundary, and the mutex around
//! each entry serializes port access between a superseded worker that is
//! still draining its final read and the worker that replaced it.

use crate::driver::SerialDriver;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared handle to a registered driver.
pub type SharedDriver = Arc<Mutex<dyn SerialDriver>>;

static DRIVERS: Lazy<Mutex<HashMap<u64, SharedDriver>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Copyable identity of a registered driver.
///
/// Tokens are process-unique and never reused; a token whose driver has been
/// deregistered simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortToken(u64);

impl std::fmt::Display for PortToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Register a driver and return the token that identifies it.
pub fn register<D: SerialDriver + 'static>(driver: D) -> PortToken {
    let token = PortToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
    let name = driver.name().to_string();
    let shared: SharedDriver = Arc::new(Mutex::new(driver));
    DRIVERS.lock().insert(token.0, shared);
    debug!(%token, port = %name, "registered serial driver");
    token
}

/// Look up the driver behind a token.
pub fn resolve(token: PortToken) -> Option<SharedDriver> {
    DRIVERS.lock().get(&token.0).cloned()
}

/// Remove a driver from the registry, returning the final shared handle so
/// the caller can close it. Readers still holding the handle keep it alive
/// until they drop it.
pub fn deregister(token: PortToken) -> Option<SharedDriver> {
    let entry = DRIVERS.lock().remove(&token.0);
    if entry.is_some() {
        debug!(%token, "deregistered serial driver");
    }
    entry
}
