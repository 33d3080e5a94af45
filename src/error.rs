//! Centralized error type for the midicat binary.
//!
//! Wraps transport errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("[command] missing")]
    MissingCommand,

    #[error(transparent)]
    Midi(#[from] midicat_io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
