//! The system journal: chapters D, V, Q, F and X.

use super::Outcome;
use crate::mtc::Timecode;
use crate::sequencer::Sequencer;
use crate::stamp::{self, Logged, Stamp, Touch};
use crate::sysex::SysexContent;
use crate::wire::{sysex, DATA};
use smallvec::SmallVec;
use tracing::debug;
use tutti_midi::status;
use tutti_midi::CommandKind;

/// Longest data field of an undefined common log, so LENGTH fits one byte.
pub(crate) const MAX_COMMON_DATA: usize = 0xFF - 3;

/// Chapter D fields. Counts live in [`SystemJournal`] and outlast trims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimpleChapter {
    pub stamp: Stamp,
    pub reset: Option<Stamp>,
    pub tune: Option<Stamp>,
    pub song: Option<Logged<u8>>,
    /// 0xF4 and 0xF5, with their data bytes.
    pub commons: [Option<Logged<SmallVec<[u8; 4]>>>; 2],
    /// 0xF9 and 0xFD.
    pub realtimes: [Option<Stamp>; 2],
}

impl SimpleChapter {
    fn new(touch: Touch) -> Self {
        Self {
            stamp: Stamp::new(touch),
            reset: None,
            tune: None,
            song: None,
            commons: [None, None],
            realtimes: [None, None],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reset.is_none()
            && self.tune.is_none()
            && self.song.is_none()
            && self.commons.iter().all(Option::is_none)
            && self.realtimes.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SysexLog {
    pub content: SysexContent,
    pub tcount: u8,
    pub stamp: Stamp,
}

/// Chapter X, least recently sent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SysexChapter {
    pub stamp: Stamp,
    pub logs: Vec<SysexLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SystemCounts {
    pub reset: u8,
    pub tune: u8,
    pub sense: u8,
    pub commons: [u8; 2],
    pub realtimes: [u8; 2],
    /// Per [`SysexContent::slot`].
    pub sysex: [u8; sysex::MAX_SLOTS],
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SystemJournal {
    pub stamp: Option<Stamp>,
    pub simple: Option<SimpleChapter>,
    pub sense: Option<Stamp>,
    pub sequencer_stamp: Option<Stamp>,
    pub timecode_stamp: Option<Stamp>,
    pub complete_stamp: Option<Stamp>,
    pub sysex: Option<SysexChapter>,

    pub counts: SystemCounts,
    pub sequencer: Sequencer,
    pub timecode: Timecode,
}

impl SystemJournal {
    pub fn has_chapters(&self) -> bool {
        self.simple.is_some()
            || self.sense.is_some()
            || self.sequencer_stamp.is_some()
            || self.timecode_stamp.is_some()
            || self.sysex.is_some()
    }

    /// Forgets every chapter. Counts, sequencer and time code state persist.
    pub fn clear(&mut self) {
        self.stamp = None;
        self.simple = None;
        self.sense = None;
        self.sequencer_stamp = None;
        self.timecode_stamp = None;
        self.complete_stamp = None;
        self.sysex = None;
    }

    pub fn record(&mut self, kind: &CommandKind<'_>, touch: Touch) -> Outcome {
        match *kind {
            CommandKind::SysEx(payload) => {
                let content = match SysexContent::recognize(payload) {
                    Ok(content) => content,
                    Err(e) => {
                        debug!(error = %e, len = payload.len(), "Sending SysEx unprotected");
                        return Outcome::Unsupported("SysEx is not journaled");
                    }
                };
                stamp::touch(&mut self.stamp, touch);
                self.sysex(content, touch);
            }
            CommandKind::Clock
            | CommandKind::Start
            | CommandKind::Continue
            | CommandKind::Stop
            | CommandKind::SongPosition(_) => {
                if !self.sequencer.apply(kind) {
                    return Outcome::Ignored;
                }
                stamp::touch(&mut self.stamp, touch);
                stamp::touch(&mut self.sequencer_stamp, touch);
            }
            CommandKind::QuarterFrame(data) => {
                stamp::touch(&mut self.stamp, touch);
                stamp::touch(&mut self.timecode_stamp, touch);
                if self.timecode.quarter_frame(data) {
                    stamp::touch(&mut self.complete_stamp, touch);
                }
            }
            CommandKind::ActiveSensing => {
                stamp::touch(&mut self.stamp, touch);
                self.counts.sense = (self.counts.sense + 1) & DATA;
                stamp::touch(&mut self.sense, touch);
            }
            CommandKind::Reset
            | CommandKind::TuneRequest
            | CommandKind::SongSelect(_)
            | CommandKind::UndefinedCommon { .. }
            | CommandKind::UndefinedRealtime(_) => {
                stamp::touch(&mut self.stamp, touch);
                self.simple(kind, touch);
            }
            _ => return Outcome::Ignored,
        }
        Outcome::Journaled
    }

    fn simple(&mut self, kind: &CommandKind<'_>, touch: Touch) {
        let chapter = self.simple.get_or_insert_with(|| SimpleChapter::new(touch));
        chapter.stamp.touch(touch);
        let counts = &mut self.counts;

        match *kind {
            CommandKind::Reset => {
                counts.reset = (counts.reset + 1) & DATA;
                stamp::touch(&mut chapter.reset, touch);
            }
            CommandKind::TuneRequest => {
                counts.tune = (counts.tune + 1) & DATA;
                stamp::touch(&mut chapter.tune, touch);
            }
            CommandKind::SongSelect(song) => Logged::set(&mut chapter.song, song & DATA, touch),
            CommandKind::UndefinedCommon { status: code, data } => {
                let slot = usize::from(code == status::UNDEFINED_F5);
                counts.commons[slot] = counts.commons[slot].wrapping_add(1);
                let data = &data[..data.len().min(MAX_COMMON_DATA)];
                Logged::set(
                    &mut chapter.commons[slot],
                    SmallVec::from_slice(data),
                    touch,
                );
            }
            CommandKind::UndefinedRealtime(code) => {
                let slot = usize::from(code == status::UNDEFINED_FD);
                counts.realtimes[slot] = counts.realtimes[slot].wrapping_add(1);
                stamp::touch(&mut chapter.realtimes[slot], touch);
            }
            _ => {}
        }
    }

    fn sysex(&mut self, content: SysexContent, touch: Touch) {
        let slot = content.slot();
        let tcount = &mut self.counts.sysex[slot];
        *tcount = (*tcount + 1) & DATA;
        let tcount = *tcount;

        let chapter = self.sysex.get_or_insert_with(|| SysexChapter {
            stamp: Stamp::new(touch),
            logs: Vec::new(),
        });
        chapter.stamp.touch(touch);

        let stamp = match chapter
            .logs
            .iter()
            .position(|log| log.content.slot() == slot)
        {
            Some(i) => {
                let mut stamp = chapter.logs.remove(i).stamp;
                stamp.touch(touch);
                stamp
            }
            None => Stamp::new(touch),
        };
        chapter.logs.push(SysexLog {
            content,
            tcount,
            stamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutti_midi::MidiCommand;

    fn record(system: &mut SystemJournal, command: MidiCommand, seq: u32) -> Outcome {
        system.record(&command.kind(), Touch::fresh(seq))
    }

    #[test]
    fn test_transport_filtering() {
        let mut system = SystemJournal::default();
        assert_eq!(record(&mut system, MidiCommand::clock(), 1), Outcome::Ignored);
        assert!(system.stamp.is_none());
        assert_eq!(record(&mut system, MidiCommand::start(), 2), Outcome::Journaled);
        assert!(system.sequencer_stamp.is_some());
    }

    #[test]
    fn test_simple_counts() {
        let mut system = SystemJournal::default();
        record(&mut system, MidiCommand::system_reset(), 1);
        record(&mut system, MidiCommand::system_reset(), 2);
        record(&mut system, MidiCommand::song_select(9), 3);
        let common = MidiCommand::undefined_common(0xF5, &[1, 2]).unwrap();
        record(&mut system, common, 4);

        assert_eq!(system.counts.reset, 2);
        assert_eq!(system.counts.commons, [0, 1]);
        let chapter = system.simple.as_ref().unwrap();
        assert_eq!(chapter.song.as_ref().map(|s| s.value), Some(9));
        assert_eq!(
            chapter.commons[1].as_ref().map(|c| c.value.to_vec()),
            Some(vec![1, 2])
        );
    }

    #[test]
    fn test_sysex_recency() {
        let mut system = SystemJournal::default();
        let gm_on = MidiCommand::sysex(&[0x7E, 0x7F, 0x09, 0x01]);
        let volume = MidiCommand::sysex(&[0x7F, 0x7F, 0x04, 0x01, 0, 100]);
        record(&mut system, gm_on.clone(), 1);
        record(&mut system, volume, 2);
        record(&mut system, gm_on, 3);

        let logs = &system.sysex.as_ref().unwrap().logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].content, SysexContent::GmReset(1));
        assert_eq!(logs[1].tcount, 2);

        let vendor = MidiCommand::sysex(&[0x43, 0x12, 0x00]);
        assert!(matches!(
            record(&mut system, vendor, 4),
            Outcome::Unsupported(_)
        ));
    }

    #[test]
    fn test_quarter_frames_stamp_complete() {
        let mut system = SystemJournal::default();
        for id in 0..8u8 {
            record(&mut system, MidiCommand::quarter_frame(id << 4), u32::from(id) + 1);
        }
        assert_eq!(system.complete_stamp.map(|s| s.seq), Some(8));
        assert!(system.timecode.complete.is_some());
    }
}
