//! Turns a parsed journal into the commands that bring the shadow state in
//! line with the sender's.
//!
//! The shadow only changes after a command has made it into the buffer, so a
//! repair cut short by a full buffer leaves it describing exactly what was
//! delivered and the next journal picks up where this one stopped.

use super::parse::{
    ChannelSection, Item, Journal, KeyedLog, NoteSection, ParamSection, ProgramSection,
    SimpleSection, SysexLog, SystemSection,
};
use super::shadow::{ChannelShadow, ProgramShadow, SystemShadow};
use super::CommandBuffer;
use crate::param::{ParamMode, ParamNumber, ParamSelect};
use crate::sequencer::{Sequencer, CLOCKS_PER_BEAT};
use crate::source::SourceId;
use crate::sysex::SysexContent;
use crate::wire::{control, param, DATA};
use std::time::{Duration, Instant};
use tracing::trace;
use tutti_midi::status::{self, cc};
use tutti_midi::MidiCommand;

/// The command buffer ran out of room.
pub(crate) struct Full;

type Step = std::result::Result<(), Full>;

const NULL_PARAM: u8 = 0x7F;

pub(crate) struct Repair<'a> {
    pub out: &'a mut CommandBuffer,
    pub source: SourceId,
    /// More than one packet was lost, so stale items count too.
    pub many: bool,
    pub on_time: bool,
    pub now: Instant,
    /// Extended sequence number of the packet being repaired.
    pub ext_seq: u32,
    /// Journal checkpoint, extended against the receiver's sequence history.
    pub checkpoint: u32,
    pub dated_after: Duration,
}

impl Repair<'_> {
    fn emit(&mut self, command: MidiCommand) -> Step {
        trace!(source = ?self.source, command = ?command.kind(), "Repair");
        if self.out.push(self.source, command) {
            Ok(())
        } else {
            Err(Full)
        }
    }

    #[inline]
    fn wants(&self, stale: bool) -> bool {
        !stale || self.many
    }

    fn wanted<T: Copy>(&self, item: Option<Item<T>>) -> Option<T> {
        item.filter(|item| self.wants(item.stale))
            .map(|item| item.value)
    }

    pub fn run(
        &mut self,
        journal: &Journal,
        system: &mut SystemShadow,
        channels: &mut [ChannelShadow],
    ) -> Step {
        if let Some(section) = &journal.system {
            self.system(section, system)?;
        }
        for section in &journal.channels {
            let shadow = &mut channels[usize::from(section.channel & 0x0F)];
            self.channel(section, shadow)?;
        }
        Ok(())
    }

    fn system(&mut self, section: &SystemSection, shadow: &mut SystemShadow) -> Step {
        if let Some(simple) = &section.simple {
            self.simple(simple, shadow)?;
        }
        if let Some(sense) = self.wanted(section.sense) {
            if sense != shadow.sense {
                self.emit(MidiCommand::active_sensing())?;
                shadow.sense = sense;
            }
        }
        if let Some(sequencer) = self.wanted(section.sequencer) {
            self.sequencer(sequencer, shadow)?;
        }
        if let Some(timecode) = self.wanted(section.timecode) {
            shadow.timecode.merge(&timecode);
        }
        if let Some(sysex) = section.sysex.as_ref().filter(|item| self.wants(item.stale)) {
            self.sysex(&sysex.value, shadow)?;
        }
        Ok(())
    }

    fn simple(&mut self, section: &SimpleSection, shadow: &mut SystemShadow) -> Step {
        if let Some(reset) = self.wanted(section.reset) {
            if reset != shadow.reset {
                self.emit(MidiCommand::system_reset())?;
                shadow.reset = reset;
            }
        }
        if let Some(tune) = self.wanted(section.tune) {
            if tune != shadow.tune {
                self.emit(MidiCommand::tune_request())?;
                shadow.tune = tune;
            }
        }
        if let Some(song) = self.wanted(section.song) {
            if shadow.song != Some(song) {
                self.emit(MidiCommand::song_select(song))?;
                shadow.song = Some(song);
            }
        }

        for (i, code) in [status::UNDEFINED_F4, status::UNDEFINED_F5]
            .into_iter()
            .enumerate()
        {
            let Some(log) = section.commons[i]
                .as_ref()
                .filter(|item| self.wants(item.stale))
                .map(|item| &item.value)
            else {
                continue;
            };
            let common = &mut shadow.commons[i];
            let changed = match log.count {
                Some(count) => count != common.count,
                None => log.data != common.data,
            };
            if !changed {
                continue;
            }
            if let Ok(command) = MidiCommand::undefined_common(code, &log.data) {
                self.emit(command)?;
            }
            if let Some(count) = log.count {
                common.count = count;
            }
            common.data = log.data.clone();
        }

        for (i, code) in [status::UNDEFINED_F9, status::UNDEFINED_FD]
            .into_iter()
            .enumerate()
        {
            let Some(Some(count)) = self.wanted(section.realtimes[i]) else {
                continue;
            };
            if count == shadow.realtimes[i] {
                continue;
            }
            if let Ok(command) = MidiCommand::realtime(code) {
                self.emit(command)?;
            }
            shadow.realtimes[i] = count;
        }
        Ok(())
    }

    /// Stops the transport, relocates it, and restarts it in the journal's state.
    fn sequencer(&mut self, journal: Sequencer, shadow: &mut SystemShadow) -> Step {
        if journal == shadow.sequencer {
            return Ok(());
        }

        if shadow.sequencer.running {
            self.emit(MidiCommand::stop())?;
        }
        let clocks = journal.clock.unwrap_or(0);
        let beats = clocks / CLOCKS_PER_BEAT;
        self.emit(MidiCommand::song_position((beats & 0x3FFF) as u16))?;

        if journal.downbeat {
            self.emit(MidiCommand::resume())?;
            for _ in 0..=(clocks - beats * CLOCKS_PER_BEAT) {
                self.emit(MidiCommand::clock())?;
            }
            if !journal.running {
                self.emit(MidiCommand::stop())?;
            }
        } else if journal.running {
            self.emit(MidiCommand::resume())?;
        }
        shadow.sequencer = journal;
        Ok(())
    }

    /// Reissues the most recent GM mode and master volume the journal holds.
    fn sysex(&mut self, logs: &[SysexLog], shadow: &mut SystemShadow) -> Step {
        let mut gm = None;
        let mut volume = None;
        for log in logs {
            match log.content {
                Some(content @ SysexContent::GmReset(_)) => gm = Some((content, log.tcount)),
                Some(content @ SysexContent::MasterVolume { .. }) => {
                    volume = Some((content, log.tcount))
                }
                None => {}
            }
        }

        if let Some((content @ SysexContent::MasterVolume { lsb, msb }, tcount)) = volume {
            if shadow.volume != Some((lsb, msb)) {
                self.emit(MidiCommand::sysex(&content.payload()))?;
                shadow.volume = Some((lsb, msb));
                if let Some(count) = tcount {
                    shadow.sysex_counts[content.slot()] = count;
                }
            }
        }

        if let Some((content @ SysexContent::GmReset(value), tcount)) = gm {
            let slot = content.slot();
            let recount = tcount.is_some_and(|count| count != shadow.sysex_counts[slot]);
            if shadow.gm != Some(value) || recount {
                self.emit(MidiCommand::sysex(&content.payload()))?;
                shadow.gm = Some(value);
                shadow.sysex_counts[slot] =
                    tcount.unwrap_or((shadow.sysex_counts[slot] + 1) & DATA);
            }
        }
        Ok(())
    }

    fn channel(&mut self, section: &ChannelSection, shadow: &mut ChannelShadow) -> Step {
        let ch = section.channel;
        if let Some(program) = self.wanted(section.program) {
            self.program(ch, program, shadow)?;
        }
        if let Some(chapter) = section
            .controllers
            .as_ref()
            .filter(|chapter| self.wants(chapter.stale))
        {
            for log in &chapter.value {
                if self.wants(log.stale) {
                    self.controller(ch, log, shadow)?;
                }
            }
        }
        if let Some(chapter) = section
            .params
            .as_ref()
            .filter(|chapter| self.wants(chapter.stale))
        {
            self.params(ch, chapter, shadow)?;
        }
        if let Some(wheel) = self.wanted(section.wheel) {
            if shadow.wheel != Some(wheel) {
                let [lsb, msb] = wheel;
                let value = u16::from(lsb) | (u16::from(msb) << 7);
                self.emit(MidiCommand::pitch_bend(ch, value))?;
                shadow.wheel = Some(wheel);
            }
        }
        if let Some(chapter) = &section.notes {
            self.notes(ch, chapter, shadow)?;
        }
        if let Some(pressure) = self.wanted(section.pressure) {
            if shadow.pressure != Some(pressure) {
                self.emit(MidiCommand::channel_pressure(ch, pressure))?;
                shadow.pressure = Some(pressure);
            }
        }
        if let Some(chapter) = section
            .poly
            .as_ref()
            .filter(|chapter| self.wants(chapter.stale))
        {
            for log in &chapter.value {
                let value = log.value & DATA;
                if self.wants(log.stale) && shadow.poly[usize::from(log.key)] != Some(value) {
                    self.emit(MidiCommand::poly_pressure(ch, log.key, value))?;
                    shadow.poly[usize::from(log.key)] = Some(value);
                }
            }
        }
        Ok(())
    }

    /// A controller change the shadow follows.
    fn controller_change(
        &mut self,
        ch: u8,
        control: u8,
        value: u8,
        shadow: &mut ChannelShadow,
    ) -> Step {
        self.emit(MidiCommand::control_change(ch, control, value))?;
        shadow.controllers[usize::from(control)] = Some(value);
        Ok(())
    }

    /// Switches to the journal's bank if it differs, changes program, then
    /// puts the bank controllers back the way they were.
    fn program(&mut self, ch: u8, journal: ProgramSection, shadow: &mut ChannelShadow) -> Step {
        let (bank_msb, bank_lsb) = journal.bank.unwrap_or((0, 0));
        let target = ProgramShadow {
            program: journal.program,
            bank_msb,
            bank_lsb,
        };
        if shadow.program == Some(target) {
            return Ok(());
        }

        let saved = (
            shadow.controllers[usize::from(cc::BANK_SELECT_MSB)],
            shadow.controllers[usize::from(cc::BANK_SELECT_LSB)],
        );
        let switch_bank =
            journal.bank.is_some() && (saved.0 != Some(bank_msb) || saved.1 != Some(bank_lsb));

        if switch_bank {
            self.controller_change(ch, cc::BANK_SELECT_MSB, bank_msb, shadow)?;
            self.controller_change(ch, cc::BANK_SELECT_LSB, bank_lsb, shadow)?;
        }
        self.emit(MidiCommand::program_change(ch, journal.program))?;
        shadow.program = Some(target);
        if switch_bank {
            if let Some(msb) = saved.0 {
                self.controller_change(ch, cc::BANK_SELECT_MSB, msb, shadow)?;
            }
            if let Some(lsb) = saved.1 {
                self.controller_change(ch, cc::BANK_SELECT_LSB, lsb, shadow)?;
            }
        }
        Ok(())
    }

    fn controller(&mut self, ch: u8, log: &KeyedLog, shadow: &mut ChannelShadow) -> Step {
        let number = log.key;
        let slot = usize::from(number);
        let alternating = log.value & control::A != 0;
        let toggle = log.value & control::T != 0;
        let count = log.value & control::COUNT;

        if number == cc::SUSTAIN {
            // Logs in any other format are not ours to interpret.
            if !(alternating && toggle) {
                return Ok(());
            }
            let old = shadow.controllers[slot];
            if old == Some(count) {
                return Ok(());
            }
            let down = count & 1 == 1;
            if down && old.is_some_and(|old| old & 1 == 1) {
                // The pedal went up and down again while we were not looking.
                self.emit(MidiCommand::control_change(ch, number, 0))?;
            }
            self.emit(MidiCommand::control_change(ch, number, if down { 127 } else { 0 }))?;
            shadow.controllers[slot] = Some(count);
            return Ok(());
        }

        if cc::is_alternating(number) {
            if !alternating || toggle || shadow.controllers[slot] == Some(count) {
                return Ok(());
            }
            self.emit(MidiCommand::control_change(ch, number, 0))?;
            shadow.controllers[slot] = Some(count);
            shadow.alternated(number);
            return Ok(());
        }

        let value = log.value & DATA;
        if alternating || shadow.controllers[slot] == Some(value) {
            return Ok(());
        }
        self.controller_change(ch, number, value, shadow)
    }

    fn params(&mut self, ch: u8, chapter: &ParamSection, shadow: &mut ChannelShadow) -> Step {
        let mut repaired = false;
        let mut last = None;

        for log in &chapter.logs {
            last = Some(log.number);
            if !self.wants(log.stale) {
                continue;
            }
            let Some(slot) = log.number.tracked() else {
                continue;
            };
            let entry = log.entry_msb.is_some() || log.entry_lsb.is_some();
            if !entry && log.button.is_none() {
                continue;
            }

            let (mut msb, mut lsb) = shadow.values[slot];
            let mut button = shadow.buttons[slot];
            if let Some(value) = log.entry_msb {
                msb = value;
                lsb = 0;
            }
            if let Some(value) = log.entry_lsb {
                lsb = value;
            }
            if entry {
                button = 0;
            }
            if let Some(value) = log.button {
                button = value.clamp(-param::BUTTON_LIMIT, param::BUTTON_LIMIT);
            }

            let value_changed = (msb, lsb) != shadow.values[slot];
            if !value_changed && button == shadow.buttons[slot] {
                continue;
            }
            repaired = true;

            if value_changed {
                self.param_open(ch, log.number, shadow)?;
                self.emit(MidiCommand::control_change(ch, cc::DATA_ENTRY_MSB, msb))?;
                shadow.values[slot] = (msb, 0);
                shadow.buttons[slot] = 0;
                self.emit(MidiCommand::control_change(ch, cc::DATA_ENTRY_LSB, lsb))?;
                shadow.values[slot].1 = lsb;
                self.param_close(ch, log.number, shadow)?;
            }

            let delta = button - shadow.buttons[slot];
            if delta != 0 {
                let (control, step) = if delta > 0 {
                    (cc::DATA_INCREMENT, 1)
                } else {
                    (cc::DATA_DECREMENT, -1)
                };
                self.param_open(ch, log.number, shadow)?;
                for _ in 0..delta.unsigned_abs() {
                    self.emit(MidiCommand::control_change(ch, control, 0))?;
                    shadow.buttons[slot] += step;
                }
                self.param_close(ch, log.number, shadow)?;
            }
        }

        let target = if let Some(pending) = chapter.pending {
            let mut select = shadow.select;
            select.select(pending.selectors().0, param_msb(pending));
            select
        } else if chapter.active {
            match last.or_else(|| shadow.select.current()) {
                Some(number) => active_select(shadow.select, number),
                None => ParamSelect::default(),
            }
        } else {
            ParamSelect {
                mode: ParamMode::Off,
                ..shadow.select
            }
        };

        let unchanged = target.mode == shadow.select.mode
            && (target.mode == ParamMode::Off || target.current() == shadow.select.current());
        if !repaired && unchanged {
            return Ok(());
        }

        match (target.mode, target.current()) {
            (ParamMode::Off, _) => {
                if let Some(open) = shadow.select.current() {
                    self.param_close(ch, open, shadow)?;
                }
            }
            (ParamMode::Rpn | ParamMode::Nrpn, Some(number)) => {
                self.param_open(ch, number, shadow)?;
            }
            (ParamMode::PendingRpn | ParamMode::PendingNrpn, Some(number)) => {
                if let Some(open) = shadow.select.current() {
                    self.param_close(ch, open, shadow)?;
                }
                self.param_select(ch, number.selectors().0, param_msb(number), shadow)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn param_select(
        &mut self,
        ch: u8,
        control: u8,
        value: u8,
        shadow: &mut ChannelShadow,
    ) -> Step {
        self.emit(MidiCommand::control_change(ch, control, value))?;
        shadow.select.select(control, value);
        Ok(())
    }

    fn param_open(&mut self, ch: u8, number: ParamNumber, shadow: &mut ChannelShadow) -> Step {
        let (msb_selector, lsb_selector) = number.selectors();
        let (msb, lsb) = match number {
            ParamNumber::Rpn { msb, lsb } | ParamNumber::Nrpn { msb, lsb } => (msb, lsb),
        };
        self.param_select(ch, msb_selector, msb, shadow)?;
        self.param_select(ch, lsb_selector, lsb, shadow)
    }

    /// Selects the null parameter.
    fn param_close(&mut self, ch: u8, number: ParamNumber, shadow: &mut ChannelShadow) -> Step {
        let (msb_selector, lsb_selector) = number.selectors();
        self.param_select(ch, msb_selector, NULL_PARAM, shadow)?;
        self.param_select(ch, lsb_selector, NULL_PARAM, shadow)
    }

    fn notes(&mut self, ch: u8, chapter: &NoteSection, shadow: &mut ChannelShadow) -> Step {
        for log in &chapter.logs {
            if !self.wants(log.stale) {
                continue;
            }
            let note = &shadow.notes[usize::from(log.note)];
            let mut offs = note.refs;
            let mut play = log.velocity != 0 && log.play && self.on_time;

            // One sounding note at the logged velocity may be the very note
            // the log describes, or an older one the sender has since ended.
            if offs == 1 && note.velocity != 0 && note.velocity == log.velocity {
                let dated = note.since.map_or(true, |since| {
                    self.now.saturating_duration_since(since) > self.dated_after
                });
                let predates = note.ext_seq < self.checkpoint;
                if play {
                    if !predates && !dated {
                        play = false;
                        offs = 0;
                    }
                } else if predates || dated {
                    offs = 0;
                }
            }

            for _ in 0..offs {
                self.emit(MidiCommand::note_off(ch, log.note, 64))?;
                shadow.note_off(log.note);
            }
            if play {
                self.emit(MidiCommand::note_on(ch, log.note, log.velocity))?;
                let note = &mut shadow.notes[usize::from(log.note)];
                note.refs = note.refs.saturating_add(1);
                note.velocity = log.velocity;
                note.since = Some(self.now);
                note.ext_seq = self.ext_seq;
            }
        }

        if self.wants(chapter.offs_stale) {
            for &off in &chapter.offs {
                while shadow.notes[usize::from(off)].refs > 0 {
                    self.emit(MidiCommand::note_off(ch, off, 64))?;
                    shadow.note_off(off);
                }
                shadow.notes[usize::from(off)].velocity = 0;
            }
        }
        Ok(())
    }
}

#[inline]
fn param_msb(number: ParamNumber) -> u8 {
    match number {
        ParamNumber::Rpn { msb, .. } | ParamNumber::Nrpn { msb, .. } => msb,
    }
}

fn active_select(current: ParamSelect, number: ParamNumber) -> ParamSelect {
    let mut select = current;
    match number {
        ParamNumber::Rpn { msb, lsb } => {
            select.mode = ParamMode::Rpn;
            select.rpn = (msb, lsb);
        }
        ParamNumber::Nrpn { msb, lsb } => {
            select.mode = ParamMode::Nrpn;
            select.nrpn = (msb, lsb);
        }
    }
    select
}

#[cfg(test)]
mod tests {
    use super::super::parse::Journal;
    use super::*;
    use crate::source::SourcePool;

    fn run(journal: &[u8], many: bool, shadow: &mut ChannelShadow) -> Vec<Vec<u8>> {
        let now = Instant::now();
        let source = SourcePool::new(1).insert(1, now);
        let mut out = CommandBuffer::new(64);
        let parsed = Journal::parse(journal).unwrap();
        let mut system = SystemShadow::default();
        let mut channels = vec![ChannelShadow::default(); 16];
        channels[0] = shadow.clone();
        let result = Repair {
            out: &mut out,
            source,
            many,
            on_time: true,
            now,
            ext_seq: 10,
            checkpoint: 0,
            dated_after: Duration::from_millis(100),
        }
        .run(&parsed, &mut system, &mut channels);
        assert!(result.is_ok());
        *shadow = channels[0].clone();
        out.drain().map(|(_, c)| c.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_program_switches_bank_and_restores() {
        let mut shadow = ChannelShadow::default();
        shadow.controllers[0] = Some(1);
        shadow.controllers[32] = Some(0);
        // P: program 5, bank 3/4.
        let journal = [0x20, 0x00, 0x00, 0x00, 0x06, 0x80, 0x05, 0x83, 0x04];
        let repaired = run(&journal, false, &mut shadow);
        assert_eq!(
            repaired,
            vec![
                vec![0xB0, 0, 3],
                vec![0xB0, 32, 4],
                vec![0xC0, 5],
                vec![0xB0, 0, 1],
                vec![0xB0, 32, 0],
            ]
        );
        assert_eq!(shadow.controllers[0], Some(1));
        assert_eq!(shadow.program.map(|p| p.program), Some(5));
    }

    #[test]
    fn test_sustain_pressed_again_is_cancelled_first() {
        let mut shadow = ChannelShadow::default();
        shadow.controllers[64] = Some(1);
        // C: sustain count 3.
        let journal = [0x20, 0x00, 0x00, 0x00, 0x06, 0x40, 0x00, 0x40, 0xC3];
        let repaired = run(&journal, false, &mut shadow);
        assert_eq!(repaired, vec![vec![0xB0, 64, 0], vec![0xB0, 64, 127]]);
        assert_eq!(shadow.controllers[64], Some(3));
    }

    #[test]
    fn test_all_notes_off_clears_shadow_notes() {
        let mut shadow = ChannelShadow::default();
        shadow.notes[60].refs = 2;
        // C: All Notes Off count 1.
        let journal = [0x20, 0x00, 0x00, 0x00, 0x06, 0x40, 0x00, 0x7B, 0x81];
        let repaired = run(&journal, false, &mut shadow);
        assert_eq!(repaired, vec![vec![0xB0, 123, 0]]);
        assert_eq!(shadow.notes[60].refs, 0);
    }

    #[test]
    fn test_param_value_transaction() {
        let mut shadow = ChannelShadow::default();
        // M, E set: RPN 0/0 with J=2 and K=0.
        let journal = [
            0x20, 0x00, 0x00, 0x00, 0x0A, 0x20, 0x20, 0x07, 0x00, 0x00, 0xC0, 0x02, 0x00,
        ];
        let repaired = run(&journal, false, &mut shadow);
        assert_eq!(
            repaired,
            vec![
                vec![0xB0, 101, 0],
                vec![0xB0, 100, 0],
                vec![0xB0, 6, 2],
                vec![0xB0, 38, 0],
                vec![0xB0, 101, 127],
                vec![0xB0, 100, 127],
                vec![0xB0, 101, 0],
                vec![0xB0, 100, 0],
            ]
        );
        assert_eq!(shadow.values[0], (2, 0));
        assert_eq!(shadow.select.mode, ParamMode::Rpn);
    }

    #[test]
    fn test_param_button_delta() {
        let mut shadow = ChannelShadow::default();
        shadow.values[1] = (64, 0);
        shadow.buttons[1] = 1;
        // M: RPN 0/1 with C-button -1, no transaction left open.
        let journal = [
            0x20, 0x00, 0x00, 0x00, 0x0A, 0x20, 0x00, 0x07, 0x01, 0x00, 0x10, 0x80, 0x01,
        ];
        let repaired = run(&journal, false, &mut shadow);
        assert_eq!(
            repaired,
            vec![
                vec![0xB0, 101, 0],
                vec![0xB0, 100, 1],
                vec![0xB0, 97, 0],
                vec![0xB0, 97, 0],
                vec![0xB0, 101, 127],
                vec![0xB0, 100, 127],
            ]
        );
        assert_eq!(shadow.buttons[1], -1);
        assert_eq!(shadow.select.mode, ParamMode::Off);
    }

    #[test]
    fn test_stale_note_log_waits_for_many() {
        // N: one stale log for note 62 at velocity 80, play now.
        let journal = [0x20, 0x00, 0x00, 0x00, 0x07, 0x08, 0x01, 0xF1, 0xBE, 0xD0];
        let mut shadow = ChannelShadow::default();
        assert!(run(&journal, false, &mut shadow).is_empty());
        assert_eq!(run(&journal, true, &mut shadow), vec![vec![0x90, 62, 80]]);
        assert_eq!(shadow.notes[62].refs, 1);
        assert_eq!(shadow.notes[62].ext_seq, 10);
    }

    #[test]
    fn test_sounding_note_not_restruck() {
        let mut shadow = ChannelShadow::default();
        shadow.notes[62].refs = 1;
        shadow.notes[62].velocity = 80;
        shadow.notes[62].since = Some(Instant::now());
        shadow.notes[62].ext_seq = 5;
        let journal = [0x20, 0x00, 0x00, 0x00, 0x07, 0x08, 0x01, 0xF1, 0x3E, 0xD0];
        assert!(run(&journal, false, &mut shadow).is_empty());
    }
}
