//! # midicat
//!
//! Transfers MIDI data between MIDI ports and stdin/stdout, so that programs
//! without a MIDI driver dependency can still talk to ports:
//!
//! ```text
//! midicat in -i=10 | midicat log | midicat out -i=11
//! ```
//!
//! routes MIDI from in port 10 to out port 11 while logging the parsed
//! messages to stderr.
//!
//! The transport itself lives in [`midicat_io`]; this crate is the command
//! line on top of it.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use commands::run;
pub use error::{Error, Result};

pub use midicat_io as io;
