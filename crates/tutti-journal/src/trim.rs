//! Checkpoint trimming.
//!
//! Once every receiver has acknowledged a sequence number, nothing stamped
//! at or before it needs protecting any more.

use crate::sender::{ChannelJournal, SenderJournal, SystemJournal};
use crate::seq::localize;
use crate::stamp::{Keyed, Logged, Stamp};
use tracing::debug;

impl SenderJournal {
    /// Trims to the lowest of the receivers' reported extended sequence
    /// numbers. Returns true when the checkpoint moved.
    pub fn acknowledge<I>(&mut self, reports: I) -> bool
    where
        I: IntoIterator<Item = u32>,
    {
        let current = self.last_seq();
        let Some(lowest) = reports
            .into_iter()
            .map(|reported| localize(reported, current))
            .min()
        else {
            return false;
        };
        if lowest == self.checkpoint {
            return false;
        }
        self.trim(lowest);
        true
    }

    /// Drops everything stamped at or before `checkpoint`.
    pub fn trim(&mut self, checkpoint: u32) {
        self.checkpoint = checkpoint;
        self.system.trim(checkpoint);

        let channels = &mut self.channels;
        self.order.retain(|&ch| {
            let journal = &mut channels[usize::from(ch)];
            journal.trim(checkpoint);
            journal.stamp.is_some()
        });

        if self.is_empty() {
            self.stale = true;
        }
        debug!(checkpoint, channels = self.order.len(), "Journal trimmed");
    }
}

fn trim_stamp(slot: &mut Option<Stamp>, checkpoint: u32) {
    if slot.is_some_and(|stamp| stamp.expired(checkpoint)) {
        *slot = None;
    }
}

fn trim_logged<T>(slot: &mut Option<Logged<T>>, checkpoint: u32) {
    if slot
        .as_ref()
        .is_some_and(|logged| logged.stamp.expired(checkpoint))
    {
        *slot = None;
    }
}

fn trim_keyed<T>(slot: &mut Option<Keyed<T>>, checkpoint: u32) {
    if let Some(chapter) = slot.as_mut() {
        if chapter.stamp.expired(checkpoint) {
            *slot = None;
            return;
        }
        chapter.trim(checkpoint);
        if chapter.is_empty() {
            *slot = None;
        }
    }
}

impl SystemJournal {
    fn trim(&mut self, checkpoint: u32) {
        if self.stamp.is_some_and(|stamp| stamp.expired(checkpoint)) {
            self.clear();
            return;
        }

        if let Some(chapter) = self.simple.as_mut() {
            if chapter.stamp.expired(checkpoint) {
                self.simple = None;
            } else {
                trim_stamp(&mut chapter.reset, checkpoint);
                trim_stamp(&mut chapter.tune, checkpoint);
                trim_logged(&mut chapter.song, checkpoint);
                for common in &mut chapter.commons {
                    trim_logged(common, checkpoint);
                }
                for realtime in &mut chapter.realtimes {
                    trim_stamp(realtime, checkpoint);
                }
                if chapter.is_empty() {
                    self.simple = None;
                }
            }
        }

        trim_stamp(&mut self.sense, checkpoint);
        trim_stamp(&mut self.sequencer_stamp, checkpoint);

        trim_stamp(&mut self.timecode_stamp, checkpoint);
        if self.timecode_stamp.is_none() {
            self.complete_stamp = None;
        } else {
            trim_stamp(&mut self.complete_stamp, checkpoint);
        }

        if let Some(chapter) = self.sysex.as_mut() {
            if chapter.stamp.expired(checkpoint) {
                self.sysex = None;
            } else {
                // Least recent first: stop at the first log still needed.
                let keep = chapter
                    .logs
                    .iter()
                    .position(|log| !log.stamp.expired(checkpoint))
                    .unwrap_or(chapter.logs.len());
                chapter.logs.drain(..keep);
                if chapter.logs.is_empty() {
                    self.sysex = None;
                }
            }
        }

        if !self.has_chapters() {
            self.stamp = None;
        }
    }
}

impl ChannelJournal {
    fn trim(&mut self, checkpoint: u32) {
        if self.stamp.is_some_and(|stamp| stamp.expired(checkpoint)) {
            self.clear();
            return;
        }

        trim_logged(&mut self.program, checkpoint);
        trim_keyed(&mut self.controllers, checkpoint);

        if let Some(chapter) = self.params.as_mut() {
            if chapter.stamp.expired(checkpoint) {
                self.params = None;
            } else {
                chapter.logs.retain(|log| !log.stamp.expired(checkpoint));
            }
        }

        trim_logged(&mut self.wheel, checkpoint);

        if let Some(chapter) = self.notes.as_mut() {
            if chapter.stamp.expired(checkpoint) {
                self.notes = None;
            } else {
                chapter
                    .logs
                    .retain(|entry| !entry.stamp.expired(checkpoint));
                for off in &mut chapter.offs {
                    trim_stamp(off, checkpoint);
                }
                if chapter.is_empty() {
                    self.notes = None;
                }
            }
        }

        if let Some(chapter) = self.extras.as_mut() {
            if chapter.stamp.expired(checkpoint) {
                self.extras = None;
            } else {
                chapter
                    .logs
                    .retain(|entry| !entry.stamp.expired(checkpoint));
                if chapter.logs.is_empty() {
                    self.extras = None;
                }
            }
        }

        trim_logged(&mut self.pressure, checkpoint);
        trim_keyed(&mut self.poly, checkpoint);

        if !self.has_chapters() {
            self.stamp = None;
        }
    }
}
