//! Error types for MIDI command parsing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid status byte 0x{0:02X}")]
    InvalidStatus(u8),

    #[error("Truncated command: status 0x{status:02X} needs {needed} bytes, {available} available")]
    Truncated {
        status: u8,
        needed: usize,
        available: usize,
    },

    #[error("MIDI parse error: {0}")]
    Parse(String),
}

impl From<midi_msg::ParseError> for Error {
    fn from(e: midi_msg::ParseError) -> Self {
        Error::Parse(format!("{e:?}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
