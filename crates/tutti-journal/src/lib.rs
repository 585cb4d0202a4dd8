//! RTP-MIDI recovery journal.
//!
//! The sender side records every outgoing command into a [`SenderJournal`],
//! encodes it into each packet, and trims it once receivers acknowledge a
//! checkpoint. The receiver side tracks what each source has delivered in a
//! [`ReceiverState`] and, after packet loss, synthesizes the commands that
//! bring it back in line with the sender.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tutti_journal::{
//!     CommandBuffer, JournalConfig, RecoveryStatus, RepairContext, SenderJournal, SourcePool,
//! };
//! use tutti_midi::MidiCommand;
//!
//! let now = Instant::now();
//! let mut sender = SenderJournal::new(JournalConfig::default());
//! let mut pool = SourcePool::new(4);
//! let id = pool.insert(0x1234, now);
//!
//! // Packet 1 arrives, packet 2 (a NoteOn) is lost, packet 3 carries the journal.
//! let program = MidiCommand::program_change(0, 5);
//! sender.record(1, &program, now);
//! let source = pool.get_mut(id).unwrap();
//! source.classify(1, 4000);
//! source.receiver.track(&program, 1, now);
//!
//! sender.record(2, &MidiCommand::note_on(0, 60, 100), now);
//! let journal = sender.encode(512, now)?;
//!
//! let loss = source.classify(3, 4000);
//! let ctx = RepairContext {
//!     source: id,
//!     loss,
//!     seq: &source.seq,
//!     on_time: true,
//!     now,
//!     dated_after: Duration::from_millis(100),
//! };
//! let mut out = CommandBuffer::new(64);
//! let status = source.receiver.recover(&journal, &ctx, &mut out)?;
//! assert_eq!(status, RecoveryStatus::Recovered);
//! assert_eq!(out.as_slice()[0].1.as_bytes(), &[0x90, 60, 100]);
//! # Ok::<(), tutti_journal::Error>(())
//! ```

pub mod config;
pub use config::{FecLevel, JournalConfig};

pub mod error;
pub use error::{Error, Result};

mod encode;
mod guard;
mod stamp;
mod trim;

pub mod mtc;
pub mod param;
pub mod sequencer;
pub mod sysex;
pub mod wire;

pub mod receiver;
pub use receiver::{CommandBuffer, ReceiverState, RecoveryStatus, RepairContext};

pub mod sender;
pub use sender::{Outcome, SenderJournal, CHANNELS};

pub mod seq;
pub use seq::{localize, LossClass, SequenceTracker};

pub mod source;
pub use source::{Source, SourceId, SourcePool};
