//! MIDI driver capability set.
//!
//! Two implementations, chosen by configuration:
//! - [`NativeDriver`]: ports opened in-process through midir (`midi-io` feature)
//! - [`SubprocessDriver`]: output ports backed by a supervised child process

#[cfg(feature = "midi-io")]
mod native;
mod subprocess;

#[cfg(feature = "midi-io")]
pub use native::{NativeDriver, NativeInput, NativeOutput};
pub use subprocess::SubprocessDriver;

use crate::error::{Error, Result};
use crate::port::ChildCommand;
use crate::pump::PumpSender;
use crate::selector::{PortInfo, PortSelector};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An output port: bytes written here end up on the wire.
pub trait MidiOut: Send + Sync {
    fn open(&self) -> Result<()>;

    /// Closing a closed port is not an error.
    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Returns the number of bytes accepted. Fails with [`Error::PortClosed`]
    /// when the port is not open.
    fn write(&self, bytes: &[u8]) -> Result<usize>;

    fn number(&self) -> usize;

    fn name(&self) -> &str;
}

/// An input port. Received messages are pushed into a pump rather than
/// handled inside the driver callback.
pub trait MidiIn: Send {
    fn number(&self) -> usize;

    fn name(&self) -> &str;

    fn listen(&mut self, sink: PumpSender) -> Result<()>;

    fn stop_listening(&mut self) -> Result<()>;
}

pub trait MidiDriver: Send + Sync {
    fn inputs(&self) -> Result<Vec<PortInfo>>;

    fn outputs(&self) -> Result<Vec<PortInfo>>;

    fn open_input(&self, selector: &PortSelector) -> Result<Box<dyn MidiIn>>;

    /// Resolves the selector and returns the port already opened.
    fn open_output(&self, selector: &PortSelector) -> Result<Arc<dyn MidiOut>>;

    fn close(&self) -> Result<()>;
}

/// Adapts an output port to `io::Write` so it can sit behind a pump.
pub struct PortWriter(pub Arc<dyn MidiOut>);

impl std::io::Write for PortWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf).map_err(|e| match e {
            Error::Io(e) => e,
            other => std::io::Error::other(other.to_string()),
        })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverKind {
    #[default]
    Native,
    Subprocess,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Native => write!(f, "native"),
            DriverKind::Subprocess => write!(f, "subprocess"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(DriverKind::Native),
            "subprocess" => Ok(DriverKind::Subprocess),
            other => Err(Error::Unsupported(format!("driver \"{}\"", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub kind: DriverKind,
    /// Client name reported to the MIDI system.
    pub client_name: String,
    /// Invocation used for child processes of the subprocess driver.
    /// Defaults to the running executable.
    pub child: Option<ChildCommand>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Native,
            client_name: "midicat".to_string(),
            child: None,
        }
    }
}

impl DriverConfig {
    pub fn kind(mut self, kind: DriverKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn child(mut self, child: ChildCommand) -> Self {
        self.child = Some(child);
        self
    }

    pub fn build(self) -> Result<Arc<dyn MidiDriver>> {
        match self.kind {
            #[cfg(feature = "midi-io")]
            DriverKind::Native => Ok(Arc::new(NativeDriver::new(self.client_name))),
            #[cfg(not(feature = "midi-io"))]
            DriverKind::Native => Err(Error::Unsupported(
                "native driver (built without the midi-io feature)".to_string(),
            )),
            DriverKind::Subprocess => {
                let child = match self.child {
                    Some(child) => child,
                    None => ChildCommand::current_exe()?,
                };
                Ok(Arc::new(SubprocessDriver::new(child)))
            }
        }
    }
}
