//! Channel journals: chapters P, C, M, W, N, E, T and A.

use super::history::History;
use crate::param::{ParamMode, ParamNumber, ParamSelect, TRACKED};
use crate::stamp::{self, Entry, Keyed, Logged, Stamp, Touch};
use crate::wire::{control, extras, param, DATA};
use std::time::Instant;
use tutti_midi::status::cc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgramLog {
    pub program: u8,
    /// Bank MSB with B set, or 0 when no bank was selected.
    pub bank_msb: u8,
    /// Bank LSB with X set when Reset All Controllers came first.
    pub bank_lsb: u8,
}

/// A chapter M log. Untracked parameters share one log with no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParamLog {
    pub number: ParamNumber,
    pub stamp: Stamp,
    pub entry_msb: Option<u8>,
    pub entry_lsb: Option<u8>,
    pub button: Option<i16>,
    pub value_tool: bool,
}

impl ParamLog {
    fn new(number: ParamNumber, touch: Touch) -> Self {
        Self {
            number,
            stamp: Stamp::new(touch),
            entry_msb: None,
            entry_lsb: None,
            button: None,
            value_tool: false,
        }
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.number.tracked().is_none()
    }

    pub fn toc(&self) -> u8 {
        let mut toc = 0;
        if self.entry_msb.is_some() {
            toc |= param::TOC_J;
        }
        if self.entry_lsb.is_some() {
            toc |= param::TOC_K;
        }
        if self.button.is_some() {
            toc |= param::TOC_M;
        }
        if self.value_tool {
            toc |= param::TOC_V;
        }
        toc
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParamChapter {
    pub stamp: Stamp,
    pub logs: Vec<ParamLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NoteLog {
    pub velocity: u8,
    /// The "play now" hint holds until this instant.
    pub play_until: Option<Instant>,
}

/// Chapter N. A note is either logged as sounding or marked in the off
/// bitfield, never both. The chapter stamp's stale flag is the B bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteChapter {
    pub stamp: Stamp,
    pub logs: Vec<Entry<NoteLog>>,
    pub offs: [Option<Stamp>; 128],
}

impl NoteChapter {
    fn new(stamp: Stamp) -> Self {
        Self {
            stamp,
            logs: Vec::new(),
            offs: [None; 128],
        }
    }

    fn remove_log(&mut self, note: u8) {
        self.logs.retain(|entry| entry.key != note);
    }

    pub fn has_offs(&self) -> bool {
        self.offs.iter().any(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && !self.has_offs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extra {
    Count(u8),
    Velocity(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtrasChapter {
    pub stamp: Stamp,
    pub logs: Vec<Entry<Extra>>,
}

impl ExtrasChapter {
    fn push(&mut self, note: u8, extra: Extra, touch: Touch) {
        self.stamp.touch(touch);
        self.logs.push(Entry {
            key: note,
            value: extra,
            stamp: Stamp::new(touch),
        });
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChannelJournal {
    pub channel: u8,
    pub stamp: Option<Stamp>,

    pub program: Option<Logged<ProgramLog>>,
    pub controllers: Option<Keyed<u8>>,
    pub params: Option<ParamChapter>,
    /// Pitch wheel data bytes, LSB first.
    pub wheel: Option<Logged<[u8; 2]>>,
    pub notes: Option<NoteChapter>,
    pub extras: Option<ExtrasChapter>,
    pub pressure: Option<Logged<u8>>,
    pub poly: Option<Keyed<u8>>,

    /// Alternation counts, indexed by controller number.
    alternations: [u8; 128],
    pub select: ParamSelect,
    buttons: [i16; TRACKED],
    note_refs: [u8; 128],
    track_extras: bool,
    pub history: History,
}

impl ChannelJournal {
    pub fn new(channel: u8, track_extras: bool) -> Self {
        Self {
            channel,
            stamp: None,
            program: None,
            controllers: None,
            params: None,
            wheel: None,
            notes: None,
            extras: None,
            pressure: None,
            poly: None,
            alternations: [0; 128],
            select: ParamSelect::default(),
            buttons: [0; TRACKED],
            note_refs: [0; 128],
            track_extras,
            history: History::default(),
        }
    }

    pub fn has_chapters(&self) -> bool {
        self.program.is_some()
            || self.controllers.is_some()
            || self.params.is_some()
            || self.wheel.is_some()
            || self.notes.is_some()
            || self.extras.is_some()
            || self.pressure.is_some()
            || self.poly.is_some()
    }

    /// Forgets every chapter. Alternation counts and parameter state persist.
    pub fn clear(&mut self) {
        self.stamp = None;
        self.program = None;
        self.controllers = None;
        self.params = None;
        self.wheel = None;
        self.notes = None;
        self.extras = None;
        self.pressure = None;
        self.poly = None;
    }

    #[inline]
    fn touch(&mut self, touch: Touch) {
        stamp::touch(&mut self.stamp, touch);
    }

    pub fn program_change(&mut self, program: u8, touch: Touch) {
        self.touch(touch);
        let log = ProgramLog {
            program: program & DATA,
            bank_msb: self.history.bank_msb_byte(),
            bank_lsb: self.history.bank_lsb_byte(),
        };
        Logged::set(&mut self.program, log, touch);
        self.history.program_change(program);
    }

    pub fn control_change(&mut self, control: u8, value: u8, touch: Touch) {
        self.touch(touch);
        match control {
            cc::RPN_MSB | cc::NRPN_MSB | cc::RPN_LSB | cc::NRPN_LSB => {
                let null = self.select.select(control, value);
                self.log_param(control, value, null, touch);
            }
            cc::DATA_ENTRY_MSB | cc::DATA_ENTRY_LSB | cc::DATA_INCREMENT | cc::DATA_DECREMENT
                if self.select.mode != ParamMode::Off =>
            {
                self.select.activate();
                self.log_param(control, value, false, touch);
            }
            _ => self.log_controller(control, value, touch),
        }
    }

    fn log_controller(&mut self, control: u8, value: u8, touch: Touch) {
        self.history.control_change(control, value);

        let logged = if control == cc::SUSTAIN {
            let count = &mut self.alternations[usize::from(control)];
            if (value >= 64) != (*count & 1 == 1) {
                *count = (*count + 1) & control::COUNT;
            }
            control::A | control::T | *count
        } else if cc::is_alternating(control) {
            let count = &mut self.alternations[usize::from(control)];
            *count = (*count + 1) & control::COUNT;
            control::A | *count
        } else {
            value & DATA
        };

        self.controllers
            .get_or_insert_with(|| Keyed::new(touch))
            .upsert(control, logged, touch);

        match control {
            cc::RESET_ALL_CONTROLLERS => self.reset_controllers(),
            cc::ALL_SOUND_OFF | cc::ALL_NOTES_OFF..=cc::POLY_MODE => self.clear_notes(),
            _ => {}
        }
    }

    /// Side effects of Reset All Controllers on the rest of the channel.
    fn reset_controllers(&mut self) {
        let sustain = &mut self.alternations[usize::from(cc::SUSTAIN)];
        if *sustain & 1 == 1 {
            *sustain = (*sustain + 1) & control::COUNT;
        }
        self.select.mode = ParamMode::Off;
        self.buttons = [0; TRACKED];
        self.wheel = None;
        self.pressure = None;
        self.poly = None;
    }

    /// Side effects of the note-silencing channel mode messages.
    fn clear_notes(&mut self) {
        self.notes = None;
        self.extras = None;
        self.pressure = None;
        self.note_refs = [0; 128];
    }

    fn log_param(&mut self, control: u8, value: u8, null: bool, touch: Touch) {
        let current = self.select.current();
        let tracked = current.and_then(|number| number.tracked());
        let dummy = !null && current.is_some() && tracked.is_none();

        let chapter = self.params.get_or_insert_with(|| ParamChapter {
            stamp: Stamp::new(touch),
            logs: Vec::new(),
        });
        chapter.stamp.touch(touch);
        if !dummy {
            chapter.logs.retain(|log| !log.is_dummy());
        }

        if let Some(slot) = tracked {
            let button = &mut self.buttons[slot];
            match control {
                cc::DATA_ENTRY_MSB | cc::DATA_ENTRY_LSB => *button = 0,
                cc::DATA_INCREMENT => *button = (*button + 1).min(param::BUTTON_LIMIT),
                cc::DATA_DECREMENT => *button = (*button - 1).max(-param::BUTTON_LIMIT),
                _ => {}
            }
        }

        if self.select.mode.is_pending() {
            return;
        }
        let Some(number) = current else { return };

        let Some(slot) = tracked else {
            let mut log = match chapter.logs.iter().position(ParamLog::is_dummy) {
                Some(i) => chapter.logs.remove(i),
                None => ParamLog::new(number, touch),
            };
            log.number = number;
            log.stamp.touch(touch);
            chapter.logs.push(log);
            return;
        };

        let button = self.buttons[slot];
        let mut log = match chapter.logs.iter().position(|log| log.number == number) {
            Some(i) => {
                let mut log = chapter.logs.remove(i);
                log.stamp.touch(touch);
                log
            }
            None => {
                let mut log = ParamLog::new(number, touch);
                log.value_tool = true;
                log
            }
        };
        match control {
            cc::DATA_ENTRY_MSB => {
                log.entry_msb = Some(value & DATA);
                log.entry_lsb = None;
                log.button = None;
                log.value_tool = true;
            }
            cc::DATA_ENTRY_LSB => {
                log.entry_lsb = Some(value & DATA);
                log.button = None;
                log.value_tool = true;
            }
            cc::DATA_INCREMENT | cc::DATA_DECREMENT => {
                log.button = Some(button);
                log.value_tool = true;
            }
            _ => {}
        }
        chapter.logs.push(log);
    }

    pub fn pitch_bend(&mut self, lsb: u8, msb: u8, touch: Touch) {
        self.touch(touch);
        Logged::set(&mut self.wheel, [lsb & DATA, msb & DATA], touch);
    }

    pub fn note_off(&mut self, note: u8, velocity: u8, touch: Touch) {
        self.touch(touch);
        let chapter = self
            .notes
            .get_or_insert_with(|| NoteChapter::new(Stamp::new(touch)));
        chapter.stamp.touch(touch);
        chapter.remove_log(note);
        stamp::touch(&mut chapter.offs[usize::from(note & DATA)], touch);

        if self.track_extras {
            self.extras_note_off(note, velocity, touch);
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, play_until: Instant, touch: Touch) {
        self.touch(touch);
        let chapter = self
            .notes
            .get_or_insert_with(|| NoteChapter::new(Stamp::new(Touch::stale(touch.seq))));
        // A NoteOn leaves the bitfield's B bit alone.
        chapter.stamp.seq = touch.seq;
        chapter.offs[usize::from(note & DATA)] = None;
        chapter.remove_log(note);
        chapter.logs.push(Entry {
            key: note & DATA,
            value: NoteLog {
                velocity: velocity & DATA,
                play_until: Some(play_until),
            },
            stamp: Stamp::new(touch),
        });

        if self.track_extras {
            self.extras_note_on(note, touch);
        }
    }

    fn extras_chapter(&mut self, touch: Touch) -> &mut ExtrasChapter {
        self.extras.get_or_insert_with(|| ExtrasChapter {
            stamp: Stamp::new(touch),
            logs: Vec::new(),
        })
    }

    fn forget_extras(&mut self, note: u8, touch: Touch) {
        if let Some(chapter) = self.extras.as_mut() {
            let before = chapter.logs.len();
            chapter.logs.retain(|entry| entry.key != note);
            if chapter.logs.len() != before {
                chapter.stamp.touch(touch);
            }
        }
    }

    fn drop_empty_extras(&mut self) {
        if self.extras.as_ref().is_some_and(|c| c.logs.is_empty()) {
            self.extras = None;
        }
    }

    fn extras_note_on(&mut self, note: u8, touch: Touch) {
        self.forget_extras(note, touch);
        let refs = &mut self.note_refs[usize::from(note & DATA)];
        if *refs < extras::MAX_COUNT {
            *refs += 1;
        }
        let count = *refs;

        if count > 1 {
            let chapter = self.extras_chapter(touch);
            if chapter.logs.len() >= extras::MAX_LOGS {
                if let Some(i) = chapter
                    .logs
                    .iter()
                    .position(|entry| matches!(entry.value, Extra::Velocity(_)))
                {
                    chapter.logs.remove(i);
                }
            }
            if chapter.logs.len() < extras::MAX_LOGS {
                chapter.push(note & DATA, Extra::Count(count), touch);
            }
        }
        self.drop_empty_extras();
    }

    fn extras_note_off(&mut self, note: u8, velocity: u8, touch: Touch) {
        self.forget_extras(note, touch);
        let refs = &mut self.note_refs[usize::from(note & DATA)];
        *refs = refs.saturating_sub(1);
        let count = *refs;

        if count > 1 {
            self.extras_chapter(touch)
                .push(note & DATA, Extra::Count(count), touch);
        }
        if velocity != 64 {
            let chapter = self.extras_chapter(touch);
            if chapter.logs.len() < extras::MAX_LOGS {
                chapter.push(note & DATA, Extra::Velocity(velocity & DATA), touch);
            }
        }
        self.drop_empty_extras();
    }

    pub fn channel_pressure(&mut self, pressure: u8, touch: Touch) {
        self.touch(touch);
        Logged::set(&mut self.pressure, pressure & DATA, touch);
    }

    pub fn poly_pressure(&mut self, note: u8, pressure: u8, touch: Touch) {
        self.touch(touch);
        self.poly
            .get_or_insert_with(|| Keyed::new(touch))
            .upsert(note & DATA, pressure & DATA, touch);
    }

    /// Clears "play now" hints that have outlived their window.
    pub fn expire_note_hints(&mut self, now: Instant) {
        if let Some(chapter) = self.notes.as_mut() {
            for entry in &mut chapter.logs {
                if entry.value.play_until.is_some_and(|until| now >= until) {
                    entry.value.play_until = None;
                }
            }
        }
    }

    #[inline]
    pub fn alternation(&self, control: u8) -> u8 {
        self.alternations[usize::from(control & DATA)]
    }

    #[inline]
    pub fn button(&self, slot: usize) -> i16 {
        self.buttons.get(slot).copied().unwrap_or(0)
    }
}
