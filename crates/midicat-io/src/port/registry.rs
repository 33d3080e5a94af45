//! Bookkeeping of opened virtual ports.
//!
//! Holds weak references only: a port lives as long as its owners do, and
//! registry membership never keeps a child process alive.

use super::virtual_port::{PortInner, VirtualPort};
use crate::driver::MidiOut;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Clone, Default)]
pub struct PortRegistry {
    ports: Arc<Mutex<Vec<Weak<PortInner>>>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append-only. Called by the port under its own exclusive lock.
    pub(super) fn register(&self, port: &Arc<PortInner>) {
        let mut ports = self.ports.lock();
        if ports.iter().any(|p| std::ptr::eq(p.as_ptr(), Arc::as_ptr(port))) {
            return;
        }
        ports.push(Arc::downgrade(port));
        debug!("Registered virtual port #{}", ports.len());
    }

    /// Ports ever opened in this session, including closed ones.
    pub fn len(&self) -> usize {
        self.ports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.lock().is_empty()
    }

    fn alive(&self) -> Vec<VirtualPort> {
        self.ports
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .map(VirtualPort::from_inner)
            .collect()
    }

    pub fn open_ports(&self) -> Vec<VirtualPort> {
        self.alive().into_iter().filter(|p| p.is_open()).collect()
    }

    /// Close every port, returning the first failure after trying them all.
    pub fn close_all(&self) -> Result<()> {
        // The registry lock is released before any port lock is taken.
        let ports = self.alive();
        let mut first_error = None;
        for port in ports {
            if let Err(e) = port.close() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistry")
            .field("registered", &self.len())
            .finish()
    }
}
