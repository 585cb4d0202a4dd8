//! Channel history replayed into the journal when a receiver joins.
//!
//! A receiver that joins mid-stream never saw the program, bank, modulation
//! and volume settings sent before it arrived. The sender remembers the last
//! of each and re-logs them so the newcomer's first repair picks them up.

use super::channel::ChannelJournal;
use crate::stamp::Touch;
use crate::wire::{program, DATA};
use tutti_midi::status::cc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProgramHistory {
    program: u8,
    bank_msb: Option<u8>,
    bank_lsb: u8,
    bank_reset: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct History {
    bank_msb: Option<u8>,
    bank_lsb: u8,
    /// Reset All Controllers arrived after the last bank select.
    bank_reset: bool,
    program: Option<ProgramHistory>,
    modulation: Option<u8>,
    volume: Option<u8>,
}

impl History {
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    pub fn control_change(&mut self, control: u8, value: u8) {
        let value = value & DATA;
        match control {
            cc::BANK_SELECT_MSB => {
                self.bank_msb = Some(value);
                self.bank_lsb = 0;
                self.bank_reset = false;
            }
            cc::BANK_SELECT_LSB if self.bank_msb.is_some() => {
                self.bank_lsb = value;
                self.bank_reset = false;
            }
            cc::MODULATION => self.modulation = Some(value),
            cc::VOLUME => self.volume = Some(value),
            cc::RESET_ALL_CONTROLLERS => self.bank_reset = true,
            _ => {}
        }
    }

    pub fn program_change(&mut self, program: u8) {
        self.program = Some(ProgramHistory {
            program: program & DATA,
            bank_msb: self.bank_msb,
            bank_lsb: self.bank_lsb,
            bank_reset: self.bank_reset,
        });
    }

    /// Chapter P bank MSB byte.
    pub fn bank_msb_byte(&self) -> u8 {
        self.bank_msb.map_or(0, |msb| msb | program::B)
    }

    /// Chapter P bank LSB byte.
    pub fn bank_lsb_byte(&self) -> u8 {
        if self.bank_reset {
            self.bank_lsb | program::X
        } else {
            self.bank_lsb
        }
    }
}

impl ChannelJournal {
    /// Re-logs the channel's remembered settings. Returns false when there was
    /// nothing to replay.
    pub fn replay_history(&mut self, touch: Touch) -> bool {
        if !self.history.is_active() {
            return false;
        }
        let saved = self.history.clone();

        if let Some(program) = saved.program {
            if let Some(msb) = program.bank_msb {
                self.control_change(cc::BANK_SELECT_MSB, msb, touch);
                self.control_change(cc::BANK_SELECT_LSB, program.bank_lsb, touch);
            }
            self.history.bank_reset = program.bank_reset;
            self.program_change(program.program, touch);
        }
        if let Some(msb) = saved.bank_msb {
            self.control_change(cc::BANK_SELECT_MSB, msb, touch);
        }
        if saved.bank_lsb != 0 {
            self.control_change(cc::BANK_SELECT_LSB, saved.bank_lsb, touch);
        }
        if let Some(modulation) = saved.modulation {
            self.control_change(cc::MODULATION, modulation, touch);
        }
        if let Some(volume) = saved.volume {
            self.control_change(cc::VOLUME, volume, touch);
        }

        self.history = saved;
        true
    }
}
