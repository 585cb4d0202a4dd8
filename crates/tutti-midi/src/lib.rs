//! MIDI 1.0 command model for the Tutti RTP-MIDI journal.
//!
//! Provides a compact, self-describing [`MidiCommand`], a byte-stream parser,
//! classification into [`CommandKind`], and conversion to and from `midi_msg`.
//!
//! # Example
//!
//! ```
//! use tutti_midi::{CommandKind, MidiCommand};
//!
//! let cmd = MidiCommand::control_change(0, 64, 127);
//! assert!(matches!(cmd.kind(), CommandKind::ControlChange { control: 64, .. }));
//!
//! let parsed = MidiCommand::parse_all(&[0x90, 60, 100, 0xF8])?;
//! assert_eq!(parsed.len(), 2);
//! # Ok::<(), tutti_midi::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

mod command;
pub use command::{CommandBytes, MidiCommand};

mod kind;
pub use kind::CommandKind;

pub mod status;
