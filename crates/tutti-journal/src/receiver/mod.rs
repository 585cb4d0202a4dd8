//! Receiver side: shadow tracking and journal-driven repair.
//!
//! A receiver keeps one [`ReceiverState`] per source. Commands that arrive
//! intact are tracked into it; when packets go missing, the next packet's
//! journal is compared against it and the difference is synthesized as
//! ordinary MIDI commands into a [`CommandBuffer`].

mod parse;
mod repair;
mod shadow;

use crate::error::Result;
use crate::seq::{LossClass, SequenceTracker};
use crate::sender::CHANNELS;
use crate::source::SourceId;
use parse::{Header, Journal};
use repair::Repair;
use shadow::{ChannelShadow, SystemShadow};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tutti_midi::MidiCommand;

/// How a recovery pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// Every repair the journal called for was emitted, or none was needed.
    Recovered,
    /// The buffer filled before the repair finished. What was emitted is
    /// tracked; the rest waits for a later journal.
    FilledBuffer,
    /// The packet is a duplicate or arrived out of order and must be dropped.
    Discarded,
}

/// Bounded output of synthesized and delivered commands, each tagged with
/// the source it belongs to.
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    commands: Vec<(SourceId, MidiCommand)>,
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a command. Returns false, leaving the buffer unchanged, when full.
    pub fn push(&mut self, source: SourceId, command: MidiCommand) -> bool {
        if self.commands.len() >= self.capacity {
            return false;
        }
        self.commands.push((source, command));
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.commands.len()
    }

    pub fn as_slice(&self) -> &[(SourceId, MidiCommand)] {
        &self.commands
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (SourceId, MidiCommand)> + '_ {
        self.commands.drain(..)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Everything about the arriving packet a recovery pass needs.
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    pub source: SourceId,
    pub loss: LossClass,
    /// The source's sequence history, already updated for this packet.
    pub seq: &'a SequenceTracker,
    /// Whether NoteOns may still be replayed for this source.
    pub on_time: bool,
    pub now: Instant,
    /// A sounding note older than this is assumed not to be the one a
    /// journal log describes.
    pub dated_after: Duration,
}

/// What a receiver knows about one source's stream.
#[derive(Debug, Clone)]
pub struct ReceiverState {
    system: SystemShadow,
    channels: Vec<ChannelShadow>,
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverState {
    pub fn new() -> Self {
        Self {
            system: SystemShadow::default(),
            channels: vec![ChannelShadow::default(); CHANNELS],
        }
    }

    /// Notes a command the application received from this source.
    pub fn track(&mut self, command: &MidiCommand, ext_seq: u32, now: Instant) {
        let kind = command.kind();
        match kind.channel() {
            Some(channel) => {
                self.channels[usize::from(channel & 0x0F)].track(&kind, ext_seq, now)
            }
            None => self.system.track(&kind),
        }
    }

    /// Repairs the loss `ctx.loss` describes from a packet's journal.
    ///
    /// Journals that ask nothing of this loss are not parsed. Any other
    /// journal is parsed in full before it is acted on, so a corrupted one
    /// changes nothing.
    pub fn recover(
        &mut self,
        journal: &[u8],
        ctx: &RepairContext<'_>,
        out: &mut CommandBuffer,
    ) -> Result<RecoveryStatus> {
        let many = match ctx.loss {
            LossClass::LostOne => false,
            LossClass::LostMany => true,
            LossClass::Discard => return Ok(RecoveryStatus::Discarded),
            LossClass::Normal | LossClass::Security => return Ok(RecoveryStatus::Recovered),
        };

        let header =
            Header::parse(journal).inspect_err(|e| warn!(error = %e, "Corrupted journal"))?;
        if (!header.system && header.channels == 0) || (header.stale && !many) {
            return Ok(RecoveryStatus::Recovered);
        }
        let parsed =
            Journal::parse(journal).inspect_err(|e| warn!(error = %e, "Corrupted journal"))?;

        let before = out.len();
        let mut repair = Repair {
            out,
            source: ctx.source,
            many,
            on_time: ctx.on_time,
            now: ctx.now,
            ext_seq: ctx.seq.hi_ext(),
            checkpoint: ctx.seq.extend(header.checkpoint),
            dated_after: ctx.dated_after,
        };
        let status = match repair.run(&parsed, &mut self.system, &mut self.channels) {
            Ok(()) => RecoveryStatus::Recovered,
            Err(_) => RecoveryStatus::FilledBuffer,
        };
        debug!(
            source = ?ctx.source,
            many,
            commands = repair.out.len() - before,
            ?status,
            "Journal recovery"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalConfig;
    use crate::error::Error;
    use crate::sender::SenderJournal;
    use crate::source::SourcePool;
    use tutti_midi::{status::cc, CommandKind};

    struct Rig {
        sender: SenderJournal,
        pool: SourcePool,
        id: SourceId,
        out: CommandBuffer,
        now: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let now = Instant::now();
            let mut pool = SourcePool::new(4);
            let id = pool.insert(0xCAFE, now);
            Self {
                sender: SenderJournal::new(JournalConfig::default()),
                pool,
                id,
                out: CommandBuffer::new(256),
                now,
            }
        }

        /// Sends a packet that the receiver gets.
        fn deliver(&mut self, seq: u16, command: MidiCommand) {
            self.sender.record(u32::from(seq), &command, self.now);
            let source = self.pool.get_mut(self.id).unwrap();
            source.classify(seq, 4000);
            let ext = source.seq.hi_ext();
            source.receiver.track(&command, ext, self.now);
        }

        /// Sends a packet that is lost.
        fn lose(&mut self, seq: u16, command: MidiCommand) {
            self.sender.record(u32::from(seq), &command, self.now);
        }

        /// Sends an empty packet carrying the journal and runs recovery.
        fn recover(&mut self, seq: u16) -> Result<RecoveryStatus> {
            let journal = self.sender.encode(1024, self.now).unwrap();
            let source = self.pool.get_mut(self.id).unwrap();
            let loss = source.classify(seq, 4000);
            let ctx = RepairContext {
                source: self.id,
                loss,
                seq: &source.seq,
                on_time: source.on_time,
                now: self.now,
                dated_after: Duration::from_millis(100),
            };
            source.receiver.recover(&journal, &ctx, &mut self.out)
        }

        fn repaired(&mut self) -> Vec<Vec<u8>> {
            self.out.drain().map(|(_, c)| c.as_bytes().to_vec()).collect()
        }
    }

    #[test]
    fn test_lost_note_on_is_replayed() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::program_change(0, 1));
        rig.lose(2, MidiCommand::note_on(0, 60, 100));
        assert_eq!(rig.recover(3).unwrap(), RecoveryStatus::Recovered);
        assert_eq!(rig.repaired(), vec![vec![0x90, 60, 100]]);
    }

    #[test]
    fn test_lost_note_off_silences() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::note_on(2, 64, 90));
        rig.lose(2, MidiCommand::note_off(2, 64, 0));
        rig.recover(3).unwrap();
        assert_eq!(rig.repaired(), vec![vec![0x82, 64, 64]]);
    }

    #[test]
    fn test_no_loss_no_repair() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::note_on(0, 60, 100));
        rig.recover(2).unwrap();
        assert!(rig.out.is_empty());
    }

    #[test]
    fn test_duplicate_is_discarded() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::note_on(0, 60, 100));
        rig.deliver(2, MidiCommand::note_on(0, 61, 100));
        assert_eq!(rig.recover(2).unwrap(), RecoveryStatus::Discarded);
    }

    #[test]
    fn test_second_recovery_is_idempotent() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::control_change(0, 7, 10));
        rig.lose(2, MidiCommand::control_change(0, 7, 90));
        rig.lose(3, MidiCommand::control_change(0, 64, 127));
        rig.recover(4).unwrap();
        assert_eq!(
            rig.repaired(),
            vec![vec![0xB0, 7, 90], vec![0xB0, cc::SUSTAIN, 127]]
        );

        // The same journal again after another loss: the shadow already agrees.
        rig.lose(5, MidiCommand::active_sensing());
        rig.recover(7).unwrap();
        assert_eq!(rig.repaired(), vec![vec![0xFE]]);
    }

    #[test]
    fn test_stale_journal_ignored_after_single_loss() {
        let mut rig = Rig::new();
        rig.lose(1, MidiCommand::control_change(0, 7, 90));
        rig.sender.encode(1024, rig.now).unwrap();
        rig.deliver(2, MidiCommand::note_on(0, 1, 1));
        rig.repaired();

        // Packet 3 is lost; packet 4's journal marks CC7 stale.
        rig.lose(3, MidiCommand::note_off(0, 1, 0));
        rig.recover(4).unwrap();
        let repaired = rig.repaired();
        assert_eq!(repaired, vec![vec![0x80, 1, 64]]);
    }

    #[test]
    fn test_full_buffer_stops_cleanly() {
        let mut rig = Rig::new();
        rig.out = CommandBuffer::new(1);
        rig.deliver(1, MidiCommand::program_change(0, 1));
        rig.lose(2, MidiCommand::control_change(0, 7, 90));
        rig.lose(3, MidiCommand::control_change(0, 10, 30));
        assert_eq!(rig.recover(4).unwrap(), RecoveryStatus::FilledBuffer);
        assert_eq!(rig.repaired(), vec![vec![0xB0, 7, 90]]);

        // Only the missing command is repaired next time.
        rig.out = CommandBuffer::new(8);
        rig.lose(5, MidiCommand::tune_request());
        rig.recover(7).unwrap();
        // The system journal is repaired before the channels.
        assert_eq!(rig.repaired(), vec![vec![0xF6], vec![0xB0, 10, 30]]);
    }

    #[test]
    fn test_corrupted_journal_changes_nothing() {
        let mut rig = Rig::new();
        rig.deliver(1, MidiCommand::note_on(0, 60, 100));
        let source = rig.pool.get_mut(rig.id).unwrap();
        let loss = source.classify(3, 4000);
        let ctx = RepairContext {
            source: rig.id,
            loss,
            seq: &source.seq,
            on_time: true,
            now: rig.now,
            dated_after: Duration::from_millis(100),
        };
        let bad = [0x20, 0x00, 0x01, 0x00, 0x0A, 0x08, 0x01, 0x00];
        let result = source.receiver.recover(&bad, &ctx, &mut rig.out);
        assert!(matches!(result, Err(Error::Corrupted { .. })));
        assert!(rig.out.is_empty());
    }

    #[test]
    fn test_track_system_commands() {
        let mut state = ReceiverState::new();
        let now = Instant::now();
        state.track(&MidiCommand::song_select(4), 1, now);
        state.track(&MidiCommand::start(), 2, now);
        assert_eq!(state.system.song, Some(4));
        assert!(state.system.sequencer.running);
        assert!(matches!(MidiCommand::start().kind(), CommandKind::Start));
    }
}
