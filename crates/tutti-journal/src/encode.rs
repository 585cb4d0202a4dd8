//! Journal encoder.
//!
//! Lengths are computed from the structured state while writing, so a
//! declared length always matches what follows it.

use crate::error::{Error, Result};
use crate::sender::{ChannelJournal, Extra, SenderJournal, SystemJournal};
use crate::sequencer::CLOCK_MASK;
use crate::stamp::Stamp;
use crate::wire::{
    channel, extras, journal, note, param, put_len10, sequencer, simple, system, timecode, MAX_LEN10,
};
use std::cmp::Reverse;
use std::time::Instant;
use tracing::warn;

/// A section ready to write: `None` for the system journal.
struct Section {
    channel: Option<u8>,
    stamp: Stamp,
    bytes: Vec<u8>,
}

impl Section {
    /// Unsent changes first, then the most recently touched.
    fn urgency(&self) -> (bool, Reverse<u32>) {
        (self.stamp.stale, Reverse(self.stamp.seq))
    }
}

impl SenderJournal {
    /// Encodes the journal into at most `max_len` bytes and marks what it
    /// wrote as sent.
    ///
    /// Sections that do not fit are left out whole, least urgent first: stale
    /// sections go before ones with unsent changes, and older before newer.
    /// A section left out keeps its S bits clear for the next encode. Returns
    /// an empty journal when journaling is disabled.
    pub fn encode(&mut self, max_len: usize, now: Instant) -> Result<Vec<u8>> {
        if !self.config().journaling() {
            return Ok(Vec::new());
        }
        if max_len < journal::SIZE {
            return Err(Error::BufferExhausted {
                needed: journal::SIZE,
                available: max_len,
            });
        }
        self.expire_note_hints(now);

        let mut sections = Vec::with_capacity(self.order.len() + 1);
        if let (Some(stamp), Some(bytes)) = (self.system.stamp, self.system.encode()) {
            sections.push(Section {
                channel: None,
                stamp,
                bytes,
            });
        }
        for &ch in &self.order {
            let journal = &self.channels[usize::from(ch)];
            if let (Some(stamp), Some(bytes)) = (journal.stamp, journal.encode()) {
                sections.push(Section {
                    channel: Some(ch),
                    stamp,
                    bytes,
                });
            }
        }

        // Pick by urgency, write in journal order.
        let mut by_urgency: Vec<usize> = (0..sections.len()).collect();
        by_urgency.sort_by_key(|&i| sections[i].urgency());
        let mut keep = vec![false; sections.len()];
        let mut used = journal::SIZE;
        let mut dropped_fresh = false;
        for i in by_urgency {
            let section = &sections[i];
            let len = section.bytes.len();
            if len <= MAX_LEN10 && used + len <= max_len {
                keep[i] = true;
                used += len;
                continue;
            }
            dropped_fresh |= !section.stamp.stale;
            match section.channel {
                None => warn!(
                    len,
                    room = max_len - used,
                    "System journal does not fit, leaving it out"
                ),
                Some(channel) => warn!(
                    channel,
                    len,
                    room = max_len - used,
                    "Channel journal does not fit, leaving it out"
                ),
            }
        }

        let mut out = Vec::with_capacity(used);
        out.extend_from_slice(&[0; journal::SIZE]);
        let mut flags = if self.stale { crate::wire::S } else { 0 };
        let mut count = 0u8;
        for (section, &kept) in sections.iter().zip(&keep) {
            if !kept {
                continue;
            }
            out.extend_from_slice(&section.bytes);
            match section.channel {
                None => {
                    flags |= journal::Y;
                    self.system.mark_stale();
                }
                Some(ch) => {
                    count += 1;
                    self.channels[usize::from(ch)].mark_stale();
                }
            }
        }
        if count > 0 {
            flags |= journal::A | ((count - 1) & journal::CHANNELS);
        }

        let checkpoint = (self.checkpoint & 0xFFFF) as u16;
        out[0] = flags;
        out[1..journal::SIZE].copy_from_slice(&checkpoint.to_be_bytes());

        if !dropped_fresh {
            self.stale = true;
        }
        Ok(out)
    }
}

impl SystemJournal {
    fn encode(&self) -> Option<Vec<u8>> {
        let stamp = self.stamp?;
        let mut out = vec![0; system::SIZE];
        let mut flags = stamp.s_bit();

        if let Some(chapter) = self.simple.as_ref().filter(|c| !c.is_empty()) {
            flags |= system::D;
            let at = out.len();
            out.push(0);
            let mut toc = chapter.stamp.s_bit();
            if let Some(reset) = chapter.reset {
                toc |= simple::B;
                out.push(reset.s_bit() | self.counts.reset);
            }
            if let Some(tune) = chapter.tune {
                toc |= simple::G;
                out.push(tune.s_bit() | self.counts.tune);
            }
            if let Some(song) = &chapter.song {
                toc |= simple::H;
                out.push(song.stamp.s_bit() | song.value);
            }
            for (i, flag) in [simple::J, simple::K].into_iter().enumerate() {
                let Some(common) = &chapter.commons[i] else {
                    continue;
                };
                toc |= flag;
                let data = &common.value;
                let mut head = common.stamp.s_bit() | simple::COMMON_C | (data.len().min(3) as u8);
                if !data.is_empty() {
                    head |= simple::COMMON_V;
                }
                out.push(head);
                out.push((simple::COMMON_HDR_SIZE + 1 + data.len()) as u8);
                out.push(self.counts.commons[i]);
                out.extend_from_slice(data);
                if let Some(last) = out.last_mut().filter(|_| !data.is_empty()) {
                    *last |= simple::END;
                }
            }
            for (i, flag) in [simple::Y, simple::Z].into_iter().enumerate() {
                let Some(realtime) = chapter.realtimes[i] else {
                    continue;
                };
                toc |= flag;
                out.push(realtime.s_bit() | simple::REALTIME_C | simple::REALTIME_SIZE as u8);
                out.push(self.counts.realtimes[i]);
            }
            out[at] = toc;
        }

        if let Some(sense) = self.sense {
            flags |= system::V;
            out.push(sense.s_bit() | self.counts.sense);
        }

        if let Some(stamp) = self.sequencer_stamp {
            flags |= system::Q;
            let seq = &self.sequencer;
            let mut head = stamp.s_bit();
            if seq.running {
                head |= sequencer::N;
            }
            if seq.downbeat {
                head |= sequencer::D;
            }
            match seq.clock {
                Some(clock) => {
                    let clock = clock & CLOCK_MASK;
                    head |= sequencer::C | ((clock >> 16) as u8 & sequencer::TOP);
                    out.push(head);
                    out.extend_from_slice(&(clock as u16).to_be_bytes());
                }
                None => out.push(head),
            }
        }

        if let Some(stamp) = self.timecode_stamp {
            flags |= system::F;
            let tc = &self.timecode;
            let complete = tc.complete.filter(|_| self.complete_stamp.is_some());
            let mut head = stamp.s_bit() | (tc.point & timecode::POINT);
            if complete.is_some() {
                head |= timecode::C;
                if tc.from_quarters {
                    head |= timecode::Q;
                }
            }
            if tc.partial.is_some() {
                head |= timecode::P;
            }
            if tc.reverse {
                head |= timecode::D;
            }
            out.push(head);
            if let Some(fields) = complete {
                out.extend_from_slice(&fields);
            }
            if let Some(fields) = tc.partial {
                out.extend_from_slice(&fields);
            }
        }

        if let Some(chapter) = self.sysex.as_ref().filter(|c| !c.logs.is_empty()) {
            flags |= system::X;
            for (i, log) in chapter.logs.iter().enumerate() {
                // The first log's S bit speaks for the whole chapter.
                let s = if i == 0 {
                    chapter.stamp.s_bit()
                } else {
                    log.stamp.s_bit()
                };
                let mut bytes = log.content.log(log.tcount);
                bytes[0] |= s;
                out.extend_from_slice(&bytes);
            }
        }

        let len = out.len();
        out[..system::SIZE].copy_from_slice(&put_len10(flags, len));
        Some(out)
    }

    pub(crate) fn mark_stale(&mut self) {
        let stamps = [
            self.stamp.as_mut(),
            self.sense.as_mut(),
            self.sequencer_stamp.as_mut(),
            self.timecode_stamp.as_mut(),
            self.complete_stamp.as_mut(),
        ];
        for stamp in stamps.into_iter().flatten() {
            stamp.stale = true;
        }
        if let Some(chapter) = self.simple.as_mut() {
            chapter.stamp.stale = true;
            for stamp in [chapter.reset.as_mut(), chapter.tune.as_mut()]
                .into_iter()
                .chain(chapter.realtimes.iter_mut().map(Option::as_mut))
                .flatten()
            {
                stamp.stale = true;
            }
            if let Some(song) = chapter.song.as_mut() {
                song.stamp.stale = true;
            }
            for common in chapter.commons.iter_mut().flatten() {
                common.stamp.stale = true;
            }
        }
        if let Some(chapter) = self.sysex.as_mut() {
            chapter.stamp.stale = true;
            for log in &mut chapter.logs {
                log.stamp.stale = true;
            }
        }
    }
}

impl ChannelJournal {
    fn encode(&self) -> Option<Vec<u8>> {
        let stamp = self.stamp?;
        let mut out = vec![0; channel::SIZE];
        let mut toc = 0;

        if let Some(program) = &self.program {
            toc |= channel::TOC_P;
            let log = &program.value;
            out.extend_from_slice(&[
                program.stamp.s_bit() | log.program,
                log.bank_msb,
                log.bank_lsb,
            ]);
        }

        if let Some(chapter) = self.controllers.as_ref().filter(|c| !c.is_empty()) {
            toc |= channel::TOC_C;
            out.push(chapter.stamp.s_bit() | (chapter.len() - 1) as u8);
            for entry in &chapter.logs {
                out.push(entry.stamp.s_bit() | entry.key);
                out.push(entry.value);
            }
        }

        if let Some(chapter) = &self.params {
            toc |= channel::TOC_M;
            let at = out.len();
            out.extend_from_slice(&[0; param::HDR_SIZE]);
            let mut flags = chapter.stamp.s_bit();
            if let Some(pending) = self.select.pending_byte() {
                flags |= param::P;
                out.push(pending);
            } else if self.select.mode.is_active() {
                flags |= param::E;
            }
            for log in &chapter.logs {
                let [lsb, msb] = log.number.to_wire();
                out.extend_from_slice(&[log.stamp.s_bit() | lsb, msb, log.toc()]);
                out.extend(log.entry_msb);
                out.extend(log.entry_lsb);
                if let Some(button) = log.button {
                    let magnitude = button.unsigned_abs().min(param::BUTTON_LIMIT as u16);
                    let sign = if button < 0 { param::G } else { 0 };
                    out.push(sign | (magnitude >> 8) as u8);
                    out.push(magnitude as u8);
                }
            }
            let len = out.len() - at;
            out[at..at + param::HDR_SIZE].copy_from_slice(&put_len10(flags, len));
        }

        if let Some(wheel) = &self.wheel {
            toc |= channel::TOC_W;
            out.push(wheel.stamp.s_bit() | wheel.value[0]);
            out.push(wheel.value[1]);
        }

        if let Some(chapter) = self.notes.as_ref().filter(|c| !c.is_empty()) {
            toc |= channel::TOC_N;
            let mut bitfield = [0u8; 16];
            for (n, _) in chapter.offs.iter().enumerate().filter(|(_, off)| off.is_some()) {
                bitfield[n >> 3] |= note::bit(n as u8);
            }
            let used = bitfield.iter().position(|&b| b != 0).zip(bitfield.iter().rposition(|&b| b != 0));
            let logs = chapter.logs.len();
            let (len, low, high) = match used {
                _ if logs == note::MAX_LOGS => (127, note::EMPTY_LOW, 0),
                Some((low, high)) => (logs as u8, low as u8, high as u8),
                None => (logs as u8, note::EMPTY_LOW, note::EMPTY_HIGH),
            };
            out.push(chapter.stamp.s_bit() | len);
            out.push((low << note::LOW_SHIFT) | high);
            for entry in &chapter.logs {
                let y = if entry.value.play_until.is_some() { note::Y } else { 0 };
                out.push(entry.stamp.s_bit() | entry.key);
                out.push(y | entry.value.velocity);
            }
            if let Some((low, high)) = used {
                out.extend_from_slice(&bitfield[low..=high]);
            }
        }

        if let Some(chapter) = self.extras.as_ref().filter(|c| !c.logs.is_empty()) {
            toc |= channel::TOC_E;
            out.push(chapter.stamp.s_bit() | (chapter.logs.len() - 1) as u8);
            for entry in &chapter.logs {
                out.push(entry.stamp.s_bit() | entry.key);
                out.push(match entry.value {
                    Extra::Count(count) => count,
                    Extra::Velocity(velocity) => extras::V | velocity,
                });
            }
        }

        if let Some(pressure) = &self.pressure {
            toc |= channel::TOC_T;
            out.push(pressure.stamp.s_bit() | pressure.value);
        }

        if let Some(chapter) = self.poly.as_ref().filter(|c| !c.is_empty()) {
            toc |= channel::TOC_A;
            out.push(chapter.stamp.s_bit() | (chapter.len() - 1) as u8);
            for entry in &chapter.logs {
                out.push(entry.stamp.s_bit() | entry.key);
                out.push(entry.value);
            }
        }

        let len = out.len();
        let head = stamp.s_bit() | ((self.channel << channel::CHAN_SHIFT) & channel::CHAN_MASK);
        out[..2].copy_from_slice(&put_len10(head, len));
        out[2] = toc;
        Some(out)
    }

    pub(crate) fn mark_stale(&mut self) {
        if let Some(stamp) = self.stamp.as_mut() {
            stamp.stale = true;
        }
        if let Some(program) = self.program.as_mut() {
            program.stamp.stale = true;
        }
        if let Some(chapter) = self.controllers.as_mut() {
            chapter.mark_stale();
        }
        if let Some(chapter) = self.params.as_mut() {
            chapter.stamp.stale = true;
            for log in &mut chapter.logs {
                log.stamp.stale = true;
            }
        }
        if let Some(wheel) = self.wheel.as_mut() {
            wheel.stamp.stale = true;
        }
        if let Some(chapter) = self.notes.as_mut() {
            chapter.stamp.stale = true;
            for entry in &mut chapter.logs {
                entry.stamp.stale = true;
            }
            for off in chapter.offs.iter_mut().flatten() {
                off.stale = true;
            }
        }
        if let Some(chapter) = self.extras.as_mut() {
            chapter.stamp.stale = true;
            for entry in &mut chapter.logs {
                entry.stamp.stale = true;
            }
        }
        if let Some(pressure) = self.pressure.as_mut() {
            pressure.stamp.stale = true;
        }
        if let Some(chapter) = self.poly.as_mut() {
            chapter.mark_stale();
        }
    }
}
