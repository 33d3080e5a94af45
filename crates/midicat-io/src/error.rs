//! Error types for the MIDI transport.

use crate::selector::Direction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("no MIDI {0} ports available")]
    NoPorts(Direction),

    #[error("MIDI {direction} port not found: {selector}")]
    PortNotFound {
        direction: Direction,
        selector: String,
    },

    #[error("ambiguous MIDI {direction} port selection: {reason}")]
    AmbiguousPort {
        direction: Direction,
        reason: String,
    },

    #[error("MIDI out port {number} ({name}) is already running")]
    AlreadyRunning { number: usize, name: String },

    #[error("MIDI port is closed")]
    PortClosed,

    #[error("can't open MIDI out port {number} ({name}): {source}")]
    Spawn {
        number: usize,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't terminate process behind MIDI out port {number} ({name}): {source}")]
    Terminate {
        number: usize,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stream pump has stopped")]
    PumpStopped,

    #[error("invalid port listing: {0}")]
    Listing(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("signal handler error: {0}")]
    Signal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Listing(e.to_string())
    }
}

impl From<ctrlc::Error> for Error {
    fn from(e: ctrlc::Error) -> Self {
        Error::Signal(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
