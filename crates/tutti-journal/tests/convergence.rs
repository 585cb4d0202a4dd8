//! Whatever the loss pattern, a receiver that gets the final journal ends up
//! in the sender's state.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tutti_journal::{
    CommandBuffer, JournalConfig, RecoveryStatus, RepairContext, SenderJournal, SourcePool,
};
use tutti_midi::{CommandKind, MidiCommand};

/// What a synthesizer listening to a stream would end up doing.
#[derive(Debug, Default, PartialEq, Eq)]
struct Synth {
    programs: BTreeMap<u8, u8>,
    controllers: BTreeMap<(u8, u8), u8>,
    sustain: BTreeMap<u8, bool>,
    sounding: BTreeMap<(u8, u8), bool>,
    wheels: BTreeMap<u8, u16>,
    pressure: BTreeMap<u8, u8>,
    poly: BTreeMap<(u8, u8), u8>,
}

impl Synth {
    fn play(&mut self, command: &MidiCommand) {
        match command.kind() {
            CommandKind::NoteOn {
                channel,
                note,
                velocity,
            } => {
                self.sounding.insert((channel, note), velocity > 0);
            }
            CommandKind::NoteOff { channel, note, .. } => {
                self.sounding.insert((channel, note), false);
            }
            CommandKind::ControlChange {
                channel,
                control: 64,
                value,
            } => {
                self.sustain.insert(channel, value >= 64);
            }
            CommandKind::ControlChange {
                channel,
                control,
                value,
            } => {
                self.controllers.insert((channel, control), value);
            }
            CommandKind::ProgramChange { channel, program } => {
                self.programs.insert(channel, program);
            }
            CommandKind::PitchBend { channel, value } => {
                self.wheels.insert(channel, value);
            }
            CommandKind::ChannelPressure { channel, pressure } => {
                self.pressure.insert(channel, pressure);
            }
            CommandKind::PolyPressure {
                channel,
                note,
                pressure,
            } => {
                self.poly.insert((channel, note), pressure);
            }
            _ => {}
        }
    }

    /// Drops entries equal to what a fresh synth assumes.
    fn settled(mut self) -> Self {
        self.sounding.retain(|_, on| *on);
        self.sustain.retain(|_, down| *down);
        self
    }
}

fn command() -> impl Strategy<Value = MidiCommand> {
    let channel = 0u8..3;
    let note = 58u8..64;
    prop_oneof![
        (channel.clone(), note.clone(), 1u8..128).prop_map(|(c, n, v)| MidiCommand::note_on(c, n, v)),
        (channel.clone(), note.clone(), 0u8..128).prop_map(|(c, n, v)| MidiCommand::note_off(c, n, v)),
        (channel.clone(), note.clone()).prop_map(|(c, n)| MidiCommand::note_on(c, n, 0)),
        (channel.clone(), prop::sample::select(vec![1u8, 7, 10, 11, 64]), 0u8..128)
            .prop_map(|(c, cc, v)| MidiCommand::control_change(c, cc, v)),
        (channel.clone(), 0u8..128).prop_map(|(c, p)| MidiCommand::program_change(c, p)),
        (channel.clone(), 0u16..0x4000).prop_map(|(c, v)| MidiCommand::pitch_bend(c, v)),
        (channel.clone(), 0u8..128).prop_map(|(c, p)| MidiCommand::channel_pressure(c, p)),
        (channel, note, 0u8..128).prop_map(|(c, n, p)| MidiCommand::poly_pressure(c, n, p)),
    ]
}

/// One packet: its commands, whether it arrives, and whether the receiver
/// acknowledges afterwards.
fn packet() -> impl Strategy<Value = (Vec<MidiCommand>, bool, bool)> {
    (
        prop::collection::vec(command(), 0..4),
        prop::bool::weighted(0.6),
        prop::bool::weighted(0.2),
    )
}

fn run(packets: &[(Vec<MidiCommand>, bool, bool)]) -> (Synth, Synth) {
    let now = Instant::now();
    let mut sender = SenderJournal::new(JournalConfig::default());
    let mut pool = SourcePool::new(1);
    let id = pool.insert(1, now);
    let mut out = CommandBuffer::new(4096);

    let mut expected = Synth::default();
    let mut heard = Synth::default();

    let last = packets.len() as u32 + 1;
    let finale = (Vec::new(), true, false);
    for (seq, (commands, delivered, ack)) in (1u32..).zip(packets.iter().chain([&finale])) {
        let journal = sender.encode(1500, now).unwrap();
        for command in commands {
            sender.record(seq, command, now);
            expected.play(command);
        }
        if !*delivered && seq != last {
            continue;
        }

        let source = pool.get_mut(id).unwrap();
        let loss = source.classify(seq as u16, 4000);
        let ctx = RepairContext {
            source: id,
            loss,
            seq: &source.seq,
            on_time: true,
            now,
            dated_after: Duration::from_millis(100),
        };
        let status = source.receiver.recover(&journal, &ctx, &mut out).unwrap();
        assert_eq!(status, RecoveryStatus::Recovered);
        for (_, command) in out.drain() {
            heard.play(&command);
        }
        for command in commands {
            source.receiver.track(command, seq, now);
            heard.play(command);
        }
        if *ack {
            let hi = source.seq.hi_ext();
            sender.acknowledge([hi]);
        }
    }
    (expected.settled(), heard.settled())
}

proptest! {
    #[test]
    fn receiver_converges_on_sender(packets in prop::collection::vec(packet(), 1..24)) {
        let (expected, heard) = run(&packets);
        prop_assert_eq!(expected, heard);
    }

    #[test]
    fn lossless_link_needs_no_repair(packets in prop::collection::vec(command(), 1..32)) {
        let now = Instant::now();
        let mut sender = SenderJournal::new(JournalConfig::default());
        let mut pool = SourcePool::new(1);
        let id = pool.insert(9, now);
        let mut out = CommandBuffer::new(64);

        for (seq, command) in (1u32..).zip(&packets) {
            let journal = sender.encode(1500, now).unwrap();
            sender.record(seq, command, now);
            let source = pool.get_mut(id).unwrap();
            let loss = source.classify(seq as u16, 4000);
            let ctx = RepairContext {
                source: id,
                loss,
                seq: &source.seq,
                on_time: true,
                now,
                dated_after: Duration::from_millis(100),
            };
            source.receiver.recover(&journal, &ctx, &mut out).unwrap();
            source.receiver.track(command, seq, now);
        }
        prop_assert!(out.is_empty());
    }

    #[test]
    fn journal_never_exceeds_budget(
        packets in prop::collection::vec(command(), 1..64),
        budget in 3usize..64,
    ) {
        let now = Instant::now();
        let mut sender = SenderJournal::new(JournalConfig::default());
        for (seq, command) in (1u32..).zip(&packets) {
            sender.record(seq, command, now);
        }
        let journal = sender.encode(budget, now).unwrap();
        prop_assert!(journal.len() <= budget);
    }
}
