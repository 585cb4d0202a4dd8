//! # Tutti RTP-MIDI
//!
//! Loss-tolerant MIDI over RTP, built from modular subsystems.
//!
//! ## Architecture
//!
//! `tutti-rtpmidi` is an umbrella crate that coordinates:
//! - **tutti-midi** - MIDI 1.0 command model (parsing, classification, `midi-msg` interop)
//! - **tutti-journal** - Recovery journal (sender accumulator, encoder, checkpoint trim,
//!   receiver repair, source pool)
//!
//! Sockets, RTP/RTCP framing and session negotiation stay with the caller: it
//! hands each packet's sequence number, timestamps, MIDI list and journal bytes
//! to [`RtpMidiSession::receive`], and puts the bytes from
//! [`RtpMidiSession::encode_journal`] into every packet it sends.
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Instant;
//! use tutti_rtpmidi::prelude::*;
//!
//! let mut session = RtpMidiSession::builder().fec(FecLevel::Standard).build()?;
//! let now = Instant::now();
//!
//! // Sender side: journal first, then record the packet's own commands.
//! let journal = session.encode_journal(1024, now)?;
//! session.send(1, &MidiCommand::note_on(0, 60, 100), now);
//! assert_eq!(journal.len(), 3);
//!
//! // Guard packets keep the journal flowing when nothing is played.
//! let _due = session.tick(now);
//! # Ok::<(), tutti_rtpmidi::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default) - `Serialize`/`Deserialize` for [`SessionConfig`]

/// Re-export of tutti-midi for direct access
pub use tutti_midi as midi;

/// Re-export of tutti-journal for direct access
pub use tutti_journal as journal;

pub use tutti_midi::{CommandKind, MidiCommand};

pub use tutti_journal::{
    CommandBuffer, FecLevel, JournalConfig, LossClass, Outcome, RecoveryStatus, SourceId,
};

mod builder;
mod config;
mod error;
mod session;

pub use builder::SessionBuilder;
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use session::{Packet, RtpMidiSession};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        CommandBuffer, FecLevel, MidiCommand, Packet, RecoveryStatus, RtpMidiSession,
        SessionBuilder,
    };
}
