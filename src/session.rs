//! RtpMidiSession that ties the sender journal to the receivers of one session.

use crate::{Result, SessionBuilder, SessionConfig};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use tutti_journal::{
    CommandBuffer, Error as JournalError, LossClass, Outcome, RecoveryStatus, RepairContext,
    SenderJournal, Source, SourceId, SourcePool,
};
use tutti_midi::MidiCommand;

/// One RTP-MIDI packet as handed over by the transport.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Wire sequence number.
    pub seq: u16,
    /// RTP timestamp the sender stamped the packet with.
    pub timestamp: u32,
    /// Local receive time on the same clock, in timestamp units.
    pub arrival: u32,
    /// The MIDI list, already parsed.
    pub commands: &'a [MidiCommand],
    /// The recovery journal, empty when the packet carries none.
    pub journal: &'a [u8],
}

/// The journal side of an RTP-MIDI session.
///
/// Outgoing commands go through [`send`](Self::send) and every outgoing
/// packet carries [`encode_journal`](Self::encode_journal). Each remote
/// participant gets a source record; packets from it go through
/// [`receive`](Self::receive), which puts repair commands and then the
/// packet's own commands into the caller's buffer.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use tutti_rtpmidi::{CommandBuffer, MidiCommand, Packet, RecoveryStatus, RtpMidiSession};
///
/// let now = Instant::now();
/// let mut alice = RtpMidiSession::builder().build()?;
/// let mut bob = RtpMidiSession::builder().build()?;
/// let from_alice = bob.add_source(0xA11CE, now);
/// let mut out = CommandBuffer::new(64);
///
/// fn packet<'a>(seq: u16, commands: &'a [MidiCommand], journal: &'a [u8]) -> Packet<'a> {
///     Packet { seq, timestamp: 0, arrival: 0, commands, journal }
/// }
///
/// // Packet 1 arrives empty. Packet 2 changes the program and is lost.
/// let journal = alice.encode_journal(512, now)?;
/// bob.receive(from_alice, &packet(1, &[], &journal), now, &mut out)?;
///
/// alice.encode_journal(512, now)?;
/// alice.send(2, &MidiCommand::program_change(0, 12), now);
///
/// let journal = alice.encode_journal(512, now)?;
/// let note = [MidiCommand::note_on(0, 60, 90)];
/// alice.send(3, &note[0], now);
/// let status = bob.receive(from_alice, &packet(3, &note, &journal), now, &mut out)?;
///
/// assert_eq!(status, RecoveryStatus::Recovered);
/// let delivered: Vec<_> = out.drain().map(|(_, command)| command.as_bytes().to_vec()).collect();
/// assert_eq!(delivered, vec![vec![0xC0, 12], vec![0x90, 60, 90]]);
/// # Ok::<(), tutti_rtpmidi::Error>(())
/// ```
#[derive(Debug)]
pub struct RtpMidiSession {
    config: SessionConfig,
    sender: SenderJournal,
    sources: SourcePool,
}

impl RtpMidiSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub(crate) fn from_config(config: SessionConfig) -> Self {
        Self {
            sender: SenderJournal::new(config.journal.clone()),
            sources: SourcePool::new(config.journal.max_sources),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sender(&self) -> &SenderJournal {
        &self.sender
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id)
    }

    pub fn sources(&self) -> &SourcePool {
        &self.sources
    }

    /// Records a command going out in the packet with extended sequence `ext_seq`.
    pub fn send(&mut self, ext_seq: u32, command: &MidiCommand, now: Instant) -> Outcome {
        let outcome = self.sender.record(ext_seq, command, now);
        if let Outcome::Unsupported(reason) = outcome {
            trace!(reason, "Command not journaled");
        }
        outcome
    }

    /// Advances the guard timer. True when an otherwise empty packet should
    /// be sent now to carry the journal.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.sender.poll_guard(now)
    }

    /// When [`tick`](Self::tick) will next return true, for scheduling the
    /// caller's timer.
    pub fn next_tick(&self) -> Option<Instant> {
        self.sender.next_guard()
    }

    /// The journal for the next outgoing packet, at most `max_len` bytes.
    pub fn encode_journal(&mut self, max_len: usize, now: Instant) -> Result<Vec<u8>> {
        Ok(self.sender.encode(max_len, now)?)
    }

    /// Notes a participant's report of the highest sequence number it has
    /// received from us, and trims the journal to what every participant
    /// has acknowledged.
    ///
    /// Returns whether the checkpoint moved. A report below one already
    /// acknowledged is ignored.
    pub fn acknowledge(&mut self, id: SourceId, hiseq_ext: u32) -> Result<bool> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or(JournalError::UnknownSource(id))?;
        if let Some(last) = source.last_hiseq_ext.filter(|&last| hiseq_ext < last) {
            warn!(
                ssrc = source.ssrc(),
                hiseq_ext,
                last,
                "Ignored regressing acknowledgment"
            );
            return Ok(false);
        }
        source.last_hiseq_ext = Some(hiseq_ext);
        Ok(self.sender.acknowledge(self.sources.acknowledged()))
    }

    /// Starts receiving from `ssrc`.
    ///
    /// A participant new to the session also gets our channel history
    /// replayed into the journal, so it learns programs and volumes set
    /// before it joined.
    pub fn add_source(&mut self, ssrc: u32, now: Instant) -> SourceId {
        if let Some(id) = self.sources.find_ssrc(ssrc) {
            return id;
        }
        let id = self.sources.insert(ssrc, now);
        self.sender.replay_history(now);
        id
    }

    pub fn remove_source(&mut self, id: SourceId) -> bool {
        self.sources.remove(id).is_some()
    }

    /// Handles one packet from a source.
    ///
    /// After a loss the journal's repair commands come first, followed by
    /// the packet's own commands. A corrupted journal discards the whole
    /// packet: nothing is delivered and the source's state is left alone.
    pub fn receive(
        &mut self,
        id: SourceId,
        packet: &Packet<'_>,
        now: Instant,
        out: &mut CommandBuffer,
    ) -> Result<RecoveryStatus> {
        let journal = &self.config.journal;
        let source = self
            .sources
            .get_mut(id)
            .ok_or(JournalError::UnknownSource(id))?;

        let last = source.seq.hi_ext();
        let loss = source.classify(packet.seq, journal.max_dropout);
        match loss {
            LossClass::Security => {
                warn!(
                    ssrc = source.ssrc(),
                    seq = packet.seq,
                    last,
                    "Rejected implausible sequence jump"
                );
                return Err(JournalError::ReplaySuspected {
                    seq: packet.seq,
                    last,
                }
                .into());
            }
            LossClass::Discard => {
                trace!(ssrc = source.ssrc(), seq = packet.seq, "Discarded late packet");
                return Ok(RecoveryStatus::Discarded);
            }
            _ => {}
        }

        let transit = i64::from(packet.arrival) - i64::from(packet.timestamp);
        source.seq.update_jitter(transit);
        let jitter = Duration::from_secs_f64(
            f64::from(source.seq.jitter()) / f64::from(self.config.clock_rate),
        );
        if source.on_time != (jitter <= journal.note_on_expiry) {
            source.on_time = !source.on_time;
            debug!(
                ssrc = source.ssrc(),
                ?jitter,
                on_time = source.on_time,
                "Source timing changed"
            );
        }

        let ctx = RepairContext {
            source: id,
            loss,
            seq: &source.seq,
            on_time: source.on_time,
            now,
            dated_after: journal.note_dated_after,
        };
        let recovered = if loss.needs_repair() && !packet.journal.is_empty() {
            source.receiver.recover(packet.journal, &ctx, out)
        } else {
            Ok(RecoveryStatus::Recovered)
        };

        let mut status = recovered?;
        let ext_seq = source.seq.hi_ext();
        if status == RecoveryStatus::Recovered {
            for command in packet.commands {
                if !out.push(id, command.clone()) {
                    status = RecoveryStatus::FilledBuffer;
                    break;
                }
                source.receiver.track(command, ext_seq, now);
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tutti_journal::JournalConfig;

    fn packet<'a>(seq: u16, commands: &'a [MidiCommand], journal: &'a [u8]) -> Packet<'a> {
        Packet {
            seq,
            timestamp: u32::from(seq) * 10,
            arrival: u32::from(seq) * 10 + 5,
            commands,
            journal,
        }
    }

    #[test]
    fn test_unknown_source_rejected() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        assert!(session.remove_source(id));
        assert!(!session.remove_source(id));

        let mut out = CommandBuffer::new(4);
        let result = session.receive(id, &packet(1, &[], &[]), now, &mut out);
        assert!(matches!(
            result,
            Err(Error::Journal(JournalError::UnknownSource(_)))
        ));
        assert!(matches!(
            session.acknowledge(id, 1),
            Err(Error::Journal(JournalError::UnknownSource(_)))
        ));
    }

    #[test]
    fn test_add_source_is_idempotent() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let a = session.add_source(7, now);
        assert_eq!(session.add_source(7, now), a);
        assert_eq!(session.sources().len(), 1);
    }

    #[test]
    fn test_replay_suspected() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        let mut out = CommandBuffer::new(4);
        session
            .receive(id, &packet(30_000, &[], &[]), now, &mut out)
            .unwrap();
        let result = session.receive(id, &packet(40_000, &[], &[]), now, &mut out);
        assert!(matches!(
            result,
            Err(Error::Journal(JournalError::ReplaySuspected {
                seq: 40_000,
                last: 30_000
            }))
        ));
    }

    #[test]
    fn test_in_band_commands_delivered_and_tracked() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        let mut out = CommandBuffer::new(1);
        let commands = [
            MidiCommand::program_change(0, 3),
            MidiCommand::program_change(0, 4),
        ];
        let status = session
            .receive(id, &packet(1, &commands, &[]), now, &mut out)
            .unwrap();
        assert_eq!(status, RecoveryStatus::FilledBuffer);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_corrupted_journal_discards_packet() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        let mut out = CommandBuffer::new(8);
        let commands = [MidiCommand::program_change(0, 9)];
        // Header claims one channel journal that is not there.
        let result = session.receive(id, &packet(5, &commands, &[0x20, 0x00, 0x01]), now, &mut out);
        assert!(matches!(
            result,
            Err(Error::Journal(JournalError::Corrupted { .. }))
        ));
        assert_eq!(out.len(), 0);

        // Packet 6 is lost. Had packet 5's program change been tracked, the
        // repair would have nothing to do.
        let mut sender = SenderJournal::new(JournalConfig::default());
        sender.record(5, &MidiCommand::program_change(0, 9), now);
        let journal = sender.encode(1200, now).unwrap();
        let status = session
            .receive(id, &packet(7, &[], &journal), now, &mut out)
            .unwrap();
        assert_eq!(status, RecoveryStatus::Recovered);
        let heard: Vec<_> = out
            .drain()
            .map(|(_, command)| command.as_bytes().to_vec())
            .collect();
        assert_eq!(heard, vec![vec![0xC0, 9]]);
    }

    #[test]
    fn test_late_packets_mark_source_off_time() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        let mut out = CommandBuffer::new(8);
        let mut receive = |seq: u16, timestamp: u32, arrival: u32| {
            let packet = Packet {
                seq,
                timestamp,
                arrival,
                commands: &[],
                journal: &[],
            };
            session.receive(id, &packet, now, &mut out).unwrap();
        };
        receive(1, 0, 100);
        receive(2, 441, 541);
        receive(3, 882, 1_082);
        assert!(session.source(id).unwrap().on_time);

        // 200k ticks of swing is seconds at 44.1 kHz.
        let late = Packet {
            seq: 4,
            timestamp: 1_323,
            arrival: 201_323,
            commands: &[],
            journal: &[],
        };
        session.receive(id, &late, now, &mut out).unwrap();
        assert!(!session.source(id).unwrap().on_time);
    }

    #[test]
    fn test_extreme_timestamps_do_not_panic() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        let mut out = CommandBuffer::new(8);
        for seq in 1..=8u16 {
            let (timestamp, arrival) = if seq % 2 == 0 {
                (0, u32::MAX)
            } else {
                (u32::MAX, 0)
            };
            let packet = Packet {
                seq,
                timestamp,
                arrival,
                commands: &[],
                journal: &[],
            };
            assert!(session.receive(id, &packet, now, &mut out).is_ok());
        }
        assert!(!session.source(id).unwrap().on_time);
    }

    #[test]
    fn test_regressing_acknowledgment_ignored() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let id = session.add_source(1, now);
        for seq in 1..=4 {
            session.send(seq, &MidiCommand::control_change(0, 7, seq as u8), now);
        }

        assert!(session.acknowledge(id, 3).unwrap());
        assert!(!session.acknowledge(id, 1).unwrap());
        assert_eq!(session.source(id).unwrap().last_hiseq_ext, Some(3));
        assert_eq!(session.sender().checkpoint(), 3);

        assert!(session.acknowledge(id, 4).unwrap());
        assert_eq!(session.sender().checkpoint(), 4);
    }

    #[test]
    fn test_acknowledge_trims_to_slowest_source() {
        let now = Instant::now();
        let mut session = RtpMidiSession::builder().build().unwrap();
        let fast = session.add_source(1, now);
        let slow = session.add_source(2, now);
        for seq in 1..=4 {
            session.send(seq, &MidiCommand::control_change(0, 7, seq as u8), now);
        }

        assert!(session.acknowledge(slow, 2).unwrap());
        assert_eq!(session.sender().checkpoint(), 2);
        assert!(!session.acknowledge(fast, 4).unwrap());
        assert_eq!(session.sender().checkpoint(), 2);
        assert!(!session.sender().is_empty());

        assert!(session.acknowledge(slow, 4).unwrap());
        assert!(session.sender().is_empty());
    }
}
