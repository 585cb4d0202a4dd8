//! Error types for journal encoding and recovery.

use crate::source::SourceId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Corrupted journal at byte {offset}: {reason}")]
    Corrupted { offset: usize, reason: &'static str },

    #[error("Buffer exhausted: need {needed} bytes, {available} available")]
    BufferExhausted { needed: usize, available: usize },

    #[error("Sequence number {seq} is implausible after {last:#010X}")]
    ReplaySuspected { seq: u16, last: u32 },

    #[error("Unsupported content: {0}")]
    UnsupportedContent(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown source {0:?}")]
    UnknownSource(SourceId),
}

impl Error {
    pub(crate) fn corrupted(offset: usize, reason: &'static str) -> Self {
        Error::Corrupted { offset, reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
