//! Centralized error type for the tutti-rtpmidi umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Journal(#[from] tutti_journal::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] tutti_midi::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
