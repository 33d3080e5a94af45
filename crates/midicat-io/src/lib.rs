//! MIDI byte transport for midicat.
//!
//! Moves raw MIDI bytes between ports and byte streams: fixed-size framing,
//! a buffered relay between producers and sinks, native ports (midir) and
//! out ports backed by a supervised child process.
//!
//! Feature gates: `midi-io` (native hardware I/O via midir).

pub mod error;
pub use error::{Error, Result};

pub mod framer;
pub use framer::{classify, ByteFramer, Frame, FramerStats, RawChunk, CHUNK_SIZE};

pub mod pump;
pub use pump::{PumpConfig, PumpSender, PumpStats, StreamPump};

pub mod selector;
pub use selector::{Direction, PortInfo, PortListing, PortSelector};

pub mod driver;
pub use driver::{
    DriverConfig, DriverKind, MidiDriver, MidiIn, MidiOut, PortWriter, SubprocessDriver,
};

#[cfg(feature = "midi-io")]
pub use driver::NativeDriver;

pub(crate) mod port;
pub use port::{ChildCommand, PortRegistry, VirtualPort};

pub mod shutdown;
pub use shutdown::{InterruptHandle, ShutdownCoordinator};

pub use midi_msg::{MidiMsg, SystemRealTimeMsg};
