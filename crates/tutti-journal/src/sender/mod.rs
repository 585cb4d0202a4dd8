//! Sender journal accumulator.
//!
//! Every outgoing command is recorded here before its packet is sent. The
//! accumulator keeps, per chapter, just enough state to let a receiver that
//! lost packets since the checkpoint converge on the sender's state.

mod channel;
mod history;
mod system;

pub(crate) use channel::{ChannelJournal, Extra, NoteChapter, ParamChapter, ParamLog, ProgramLog};
pub(crate) use system::{SimpleChapter, SysexChapter, SystemJournal};

use crate::config::JournalConfig;
use crate::guard::GuardTimer;
use crate::stamp::Touch;
use std::time::Instant;
use tracing::debug;
use tutti_midi::{CommandKind, MidiCommand};

/// Number of MIDI channels.
pub const CHANNELS: usize = 16;

/// What recording a command did to the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Journaled,
    /// The command cannot change receiver state, e.g. a clock while stopped.
    Ignored,
    /// The command is sent unprotected.
    Unsupported(&'static str),
}

#[derive(Debug)]
pub struct SenderJournal {
    config: JournalConfig,
    /// Header S bit: nothing changed since the last encode.
    pub(crate) stale: bool,
    pub(crate) checkpoint: u32,
    last_seq: u32,
    pub(crate) system: SystemJournal,
    pub(crate) channels: Vec<ChannelJournal>,
    /// Channels with a journal, in order of first activity.
    pub(crate) order: Vec<u8>,
    guard: GuardTimer,
}

impl SenderJournal {
    pub fn new(config: JournalConfig) -> Self {
        let channels = (0..CHANNELS as u8)
            .map(|channel| ChannelJournal::new(channel, config.note_extras))
            .collect();
        Self {
            guard: GuardTimer::new(&config),
            config,
            stale: true,
            checkpoint: 0,
            last_seq: 0,
            system: SystemJournal::default(),
            channels,
            order: Vec::with_capacity(CHANNELS),
        }
    }

    #[inline]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Extended sequence number the journal currently covers from.
    #[inline]
    pub fn checkpoint(&self) -> u32 {
        self.checkpoint
    }

    /// Highest sequence number recorded so far.
    #[inline]
    pub fn last_seq(&self) -> u32 {
        self.last_seq
    }

    /// True when no chapter is present.
    pub fn is_empty(&self) -> bool {
        self.system.stamp.is_none() && self.order.is_empty()
    }

    /// Records a command sent in the packet with extended sequence `ext_seq`.
    pub fn record(&mut self, ext_seq: u32, command: &MidiCommand, now: Instant) -> Outcome {
        if !self.config.journaling() {
            return Outcome::Ignored;
        }
        self.last_seq = self.last_seq.max(ext_seq);
        let touch = Touch::fresh(ext_seq);
        let kind = command.kind();

        let outcome = match kind.channel() {
            Some(channel) => {
                self.record_channel(channel, &kind, touch, now);
                Outcome::Journaled
            }
            None => self.system.record(&kind, touch),
        };

        match outcome {
            Outcome::Journaled => {
                self.stale = false;
                if matches!(kind, CommandKind::NoteOn { velocity, .. } if velocity > 0) {
                    self.guard.touch_note_on(now);
                } else {
                    self.guard.touch(now);
                }
            }
            Outcome::Unsupported(_) | Outcome::Ignored => {}
        }
        outcome
    }

    fn record_channel(&mut self, channel: u8, kind: &CommandKind<'_>, touch: Touch, now: Instant) {
        let play_until = now + self.config.note_on_expiry;
        let journal = &mut self.channels[usize::from(channel & 0x0F)];
        match *kind {
            CommandKind::NoteOn {
                note, velocity: 0, ..
            } => journal.note_off(note, 64, touch),
            CommandKind::NoteOn { note, velocity, .. } => {
                journal.note_on(note, velocity, play_until, touch)
            }
            CommandKind::NoteOff { note, velocity, .. } => journal.note_off(note, velocity, touch),
            CommandKind::PolyPressure { note, pressure, .. } => {
                journal.poly_pressure(note, pressure, touch)
            }
            CommandKind::ControlChange { control, value, .. } => {
                journal.control_change(control, value, touch)
            }
            CommandKind::ProgramChange { program, .. } => journal.program_change(program, touch),
            CommandKind::ChannelPressure { pressure, .. } => {
                journal.channel_pressure(pressure, touch)
            }
            CommandKind::PitchBend { value, .. } => {
                journal.pitch_bend((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8, touch)
            }
            _ => {}
        }
        self.activate(channel & 0x0F);
    }

    fn activate(&mut self, channel: u8) {
        if !self.order.contains(&channel) {
            self.order.push(channel);
        }
    }

    /// Re-logs every channel's remembered settings for a receiver that just
    /// joined.
    ///
    /// The logs are stamped with the sequence number after the last one sent,
    /// so a trim in flight cannot drop them, and marked stale so receivers
    /// that only lost one packet leave them alone.
    pub fn replay_history(&mut self, now: Instant) {
        if !self.config.journaling() {
            return;
        }
        let touch = Touch::stale(self.last_seq.wrapping_add(1));
        let mut replayed = 0;
        for channel in 0..CHANNELS as u8 {
            if self.channels[usize::from(channel)].replay_history(touch) {
                self.activate(channel);
                replayed += 1;
            }
        }
        if replayed > 0 {
            debug!(channels = replayed, "Replayed channel history");
            self.guard.request(now);
        }
    }

    /// Advances the guard timer. True when a guard packet should be sent now.
    pub fn poll_guard(&mut self, now: Instant) -> bool {
        self.config.journaling() && self.guard.poll(now)
    }

    /// When the next guard packet falls due, if guard packets are enabled.
    pub fn next_guard(&self) -> Option<Instant> {
        self.guard
            .deadline()
            .filter(|_| self.config.journaling() && self.guard.enabled())
    }

    pub(crate) fn expire_note_hints(&mut self, now: Instant) {
        for &channel in &self.order {
            self.channels[usize::from(channel)].expire_note_hints(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FecLevel;
    use std::time::Duration;

    #[test]
    fn test_channels_keep_first_activity_order() {
        let mut journal = SenderJournal::new(JournalConfig::default());
        let now = Instant::now();
        journal.record(1, &MidiCommand::note_on(5, 60, 100), now);
        journal.record(2, &MidiCommand::control_change(2, 7, 100), now);
        journal.record(3, &MidiCommand::note_off(5, 60, 0), now);
        assert_eq!(journal.order, vec![5, 2]);
        assert!(!journal.stale);
    }

    #[test]
    fn test_unsupported_sysex_leaves_journal_alone() {
        let mut journal = SenderJournal::new(JournalConfig::default());
        let now = Instant::now();
        let outcome = journal.record(1, &MidiCommand::sysex(&[0x43, 0x10]), now);
        assert!(matches!(outcome, Outcome::Unsupported(_)));
        assert!(journal.stale);
        assert!(journal.is_empty());

        journal.record(2, &MidiCommand::program_change(0, 3), now);
        journal.record(2, &MidiCommand::sysex(&[0x43, 0x10]), now);
        assert!(!journal.stale);
    }

    #[test]
    fn test_no_journal_when_fec_disabled() {
        let mut journal = SenderJournal::new(JournalConfig {
            fec: FecLevel::None,
            ..Default::default()
        });
        let now = Instant::now();
        assert_eq!(
            journal.record(1, &MidiCommand::note_on(0, 60, 100), now),
            Outcome::Ignored
        );
        assert!(journal.is_empty());
        assert!(!journal.poll_guard(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_replay_requests_guard() {
        let mut journal = SenderJournal::new(JournalConfig::default());
        let now = Instant::now();
        journal.record(7, &MidiCommand::control_change(9, 7, 80), now);
        journal.encode(1200, now).unwrap();
        journal.replay_history(now);

        let volume = journal.channels[9].controllers.as_ref().unwrap().get(7).unwrap();
        assert_eq!(volume.stamp.seq, 8);
        assert!(volume.stamp.stale);
        assert!(journal.stale);
        assert!(journal.poll_guard(now));
    }
}
