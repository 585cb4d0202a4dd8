//! What the receiver believes the sender's stream has done so far.
//!
//! Every command delivered to the application passes through [`track`], so
//! the repair pass can tell which journal entries describe something the
//! receiver has not heard yet.
//!
//! [`track`]: super::ReceiverState::track

use crate::mtc::Timecode;
use crate::param::{ParamMode, ParamSelect, TRACKED};
use crate::sequencer::Sequencer;
use crate::sysex::SysexContent;
use crate::wire::{control, param, sysex, DATA};
use smallvec::SmallVec;
use std::time::Instant;
use tutti_midi::status::{self, cc};
use tutti_midi::CommandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgramShadow {
    pub program: u8,
    pub bank_msb: u8,
    pub bank_lsb: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NoteShadow {
    /// NoteOns not yet matched by a NoteOff.
    pub refs: u8,
    /// Velocity of the sounding note; 0 once it is ambiguous or released.
    pub velocity: u8,
    pub since: Option<Instant>,
    /// Extended sequence number of the packet that started the note.
    pub ext_seq: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ChannelShadow {
    pub program: Option<ProgramShadow>,
    /// Last value per controller; alternation counts for alternating ones.
    pub controllers: [Option<u8>; 128],
    pub select: ParamSelect,
    /// Data entry (MSB, LSB) of the tracked RPNs.
    pub values: [(u8, u8); TRACKED],
    pub buttons: [i16; TRACKED],
    pub wheel: Option<[u8; 2]>,
    pub pressure: Option<u8>,
    pub poly: [Option<u8>; 128],
    pub notes: [NoteShadow; 128],
}

impl Default for ChannelShadow {
    fn default() -> Self {
        Self {
            program: None,
            controllers: [None; 128],
            select: ParamSelect::default(),
            values: [(0, 0); TRACKED],
            buttons: [0; TRACKED],
            wheel: None,
            pressure: None,
            poly: [None; 128],
            notes: [NoteShadow::default(); 128],
        }
    }
}

impl ChannelShadow {
    pub fn track(&mut self, kind: &CommandKind<'_>, ext_seq: u32, now: Instant) {
        match *kind {
            CommandKind::NoteOn {
                note, velocity: 0, ..
            }
            | CommandKind::NoteOff { note, .. } => self.note_off(note),
            CommandKind::NoteOn { note, velocity, .. } => {
                let shadow = &mut self.notes[usize::from(note & DATA)];
                shadow.refs = shadow.refs.saturating_add(1);
                if shadow.refs == 1 {
                    shadow.velocity = velocity & DATA;
                    shadow.since = Some(now);
                    shadow.ext_seq = ext_seq;
                } else {
                    shadow.velocity = 0;
                }
            }
            CommandKind::PolyPressure { note, pressure, .. } => {
                self.poly[usize::from(note & DATA)] = Some(pressure & DATA);
            }
            CommandKind::ControlChange { control, value, .. } => {
                self.control_change(control & DATA, value & DATA)
            }
            CommandKind::ProgramChange { program, .. } => {
                self.program = Some(ProgramShadow {
                    program: program & DATA,
                    bank_msb: self.controllers[usize::from(cc::BANK_SELECT_MSB)].unwrap_or(0),
                    bank_lsb: self.controllers[usize::from(cc::BANK_SELECT_LSB)].unwrap_or(0),
                });
            }
            CommandKind::ChannelPressure { pressure, .. } => self.pressure = Some(pressure & DATA),
            CommandKind::PitchBend { value, .. } => {
                self.wheel = Some([(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]);
            }
            _ => {}
        }
    }

    pub fn note_off(&mut self, note: u8) {
        let shadow = &mut self.notes[usize::from(note & DATA)];
        if shadow.refs > 0 {
            shadow.refs -= 1;
            shadow.velocity = 0;
        }
    }

    fn control_change(&mut self, control: u8, value: u8) {
        match control {
            cc::RPN_MSB | cc::NRPN_MSB | cc::RPN_LSB | cc::NRPN_LSB => {
                self.select.select(control, value);
            }
            cc::DATA_ENTRY_MSB | cc::DATA_ENTRY_LSB | cc::DATA_INCREMENT | cc::DATA_DECREMENT
                if self.select.mode != ParamMode::Off =>
            {
                self.select.activate();
                let Some(slot) = self.select.current().and_then(|n| n.tracked()) else {
                    return;
                };
                match control {
                    cc::DATA_ENTRY_MSB => {
                        self.values[slot] = (value, 0);
                        self.buttons[slot] = 0;
                    }
                    cc::DATA_ENTRY_LSB => {
                        self.values[slot].1 = value;
                        self.buttons[slot] = 0;
                    }
                    cc::DATA_INCREMENT => {
                        self.buttons[slot] = (self.buttons[slot] + 1).min(param::BUTTON_LIMIT)
                    }
                    _ => self.buttons[slot] = (self.buttons[slot] - 1).max(-param::BUTTON_LIMIT),
                }
            }
            cc::SUSTAIN => {
                let mut count = self.controllers[usize::from(control)].unwrap_or(0);
                if (value >= 64) != (count & 1 == 1) {
                    count = (count + 1) & control::COUNT;
                }
                self.controllers[usize::from(control)] = Some(count);
            }
            _ if cc::is_alternating(control) => {
                let count = self.controllers[usize::from(control)].unwrap_or(0);
                self.controllers[usize::from(control)] = Some((count + 1) & control::COUNT);
                self.alternated(control);
            }
            _ => self.controllers[usize::from(control)] = Some(value),
        }
    }

    /// Side effects of the channel mode messages on everything else.
    pub fn alternated(&mut self, control: u8) {
        if control == cc::RESET_ALL_CONTROLLERS {
            let sustain = &mut self.controllers[usize::from(cc::SUSTAIN)];
            if let Some(count) = sustain.filter(|count| count & 1 == 1) {
                *sustain = Some((count + 1) & control::COUNT);
            }
            self.select = ParamSelect::default();
            self.buttons = [0; TRACKED];
            self.wheel = None;
            self.poly = [None; 128];
        } else {
            for note in &mut self.notes {
                note.refs = 0;
                note.velocity = 0;
            }
        }
        self.pressure = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CommonShadow {
    pub count: u8,
    pub data: SmallVec<[u8; 4]>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SystemShadow {
    pub reset: u8,
    pub tune: u8,
    pub song: Option<u8>,
    pub commons: [CommonShadow; 2],
    pub realtimes: [u8; 2],
    pub sense: u8,
    pub sequencer: Sequencer,
    pub timecode: Timecode,
    pub gm: Option<u8>,
    /// Per [`SysexContent::slot`].
    pub sysex_counts: [u8; sysex::MAX_SLOTS],
    pub volume: Option<(u8, u8)>,
}

impl SystemShadow {
    pub fn track(&mut self, kind: &CommandKind<'_>) {
        match *kind {
            CommandKind::SysEx(payload) => {
                let Ok(content) = SysexContent::recognize(payload) else {
                    return;
                };
                let count = &mut self.sysex_counts[content.slot()];
                *count = (*count + 1) & DATA;
                match content {
                    SysexContent::GmReset(value) => self.gm = Some(value),
                    SysexContent::MasterVolume { lsb, msb } => self.volume = Some((lsb, msb)),
                }
            }
            CommandKind::QuarterFrame(data) => {
                self.timecode.quarter_frame(data);
            }
            CommandKind::SongSelect(song) => self.song = Some(song & DATA),
            CommandKind::UndefinedCommon { status: code, data } => {
                let common = &mut self.commons[usize::from(code == status::UNDEFINED_F5)];
                common.count = common.count.wrapping_add(1);
                common.data = data.iter().map(|b| b & DATA).collect();
            }
            CommandKind::TuneRequest => self.tune = (self.tune + 1) & DATA,
            CommandKind::Reset => self.reset = (self.reset + 1) & DATA,
            CommandKind::ActiveSensing => self.sense = (self.sense + 1) & DATA,
            CommandKind::UndefinedRealtime(code) => {
                let count = &mut self.realtimes[usize::from(code == status::UNDEFINED_FD)];
                *count = count.wrapping_add(1);
            }
            CommandKind::Clock
            | CommandKind::Start
            | CommandKind::Continue
            | CommandKind::Stop
            | CommandKind::SongPosition(_) => {
                self.sequencer.apply(kind);
            }
            _ => {}
        }
    }
}
