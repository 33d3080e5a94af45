//! Subprocess-backed output ports.
//!
//! A [`VirtualPort`] looks like any other out port, but the hardware write
//! happens in a child process that opened the same port natively. Opened
//! ports are tracked in a [`PortRegistry`] so they can be closed in bulk.

mod registry;
mod virtual_port;

pub use registry::PortRegistry;
pub use virtual_port::{ChildCommand, VirtualPort};
