//! RPN / NRPN transaction state.

use crate::wire::param::Q;
use tutti_midi::status::cc;

/// Number of RPNs whose values are tracked: pitch bend sensitivity, fine and coarse tuning.
pub const TRACKED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamNumber {
    Rpn { msb: u8, lsb: u8 },
    Nrpn { msb: u8, lsb: u8 },
}

impl ParamNumber {
    /// Slot of an RPN whose value is tracked.
    #[inline]
    pub fn tracked(&self) -> Option<usize> {
        match *self {
            Self::Rpn { msb: 0, lsb } if usize::from(lsb) < TRACKED => Some(usize::from(lsb)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Rpn { msb: 0x7F, lsb: 0x7F } | Self::Nrpn { msb: 0x7F, lsb: 0x7F }
        )
    }

    #[inline]
    pub fn is_nrpn(&self) -> bool {
        matches!(self, Self::Nrpn { .. })
    }

    /// Journal encoding: LSB byte, then MSB byte with Q marking an NRPN.
    pub fn to_wire(&self) -> [u8; 2] {
        match *self {
            Self::Rpn { msb, lsb } => [lsb & 0x7F, msb & 0x7F],
            Self::Nrpn { msb, lsb } => [lsb & 0x7F, (msb & 0x7F) | Q],
        }
    }

    pub fn from_wire(lsb: u8, msb: u8) -> Self {
        if msb & Q != 0 {
            Self::Nrpn {
                msb: msb & 0x7F,
                lsb: lsb & 0x7F,
            }
        } else {
            Self::Rpn {
                msb: msb & 0x7F,
                lsb: lsb & 0x7F,
            }
        }
    }

    /// Controller numbers that select this parameter, MSB first.
    #[inline]
    pub fn selectors(&self) -> (u8, u8) {
        if self.is_nrpn() {
            (cc::NRPN_MSB, cc::NRPN_LSB)
        } else {
            (cc::RPN_MSB, cc::RPN_LSB)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    #[default]
    Off,
    PendingRpn,
    PendingNrpn,
    Rpn,
    Nrpn,
}

impl ParamMode {
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::PendingRpn | Self::PendingNrpn)
    }

    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Rpn | Self::Nrpn)
    }
}

/// Which parameter a channel's data entry controllers currently address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamSelect {
    pub mode: ParamMode,
    /// (MSB, LSB) of the last RPN selected.
    pub rpn: (u8, u8),
    pub nrpn: (u8, u8),
}

impl ParamSelect {
    /// Applies one of the four selector controllers.
    ///
    /// An MSB starts a pending transaction; an LSB completes it. Returns true
    /// when the null parameter was selected, which ends the transaction.
    pub fn select(&mut self, control: u8, value: u8) -> bool {
        match control {
            cc::RPN_MSB => {
                self.mode = ParamMode::PendingRpn;
                self.rpn = (value, 0);
            }
            cc::NRPN_MSB => {
                self.mode = ParamMode::PendingNrpn;
                self.nrpn = (value, 0);
            }
            cc::RPN_LSB => {
                self.mode = ParamMode::Rpn;
                self.rpn.1 = value;
            }
            cc::NRPN_LSB => {
                self.mode = ParamMode::Nrpn;
                self.nrpn.1 = value;
            }
            _ => return false,
        }
        let null = self.current().is_some_and(|number| number.is_null());
        if null {
            self.mode = ParamMode::Off;
        }
        null
    }

    /// Data entry completes a pending transaction.
    pub fn activate(&mut self) {
        self.mode = match self.mode {
            ParamMode::PendingRpn => ParamMode::Rpn,
            ParamMode::PendingNrpn => ParamMode::Nrpn,
            other => other,
        };
    }

    /// The parameter a pending or active transaction addresses.
    pub fn current(&self) -> Option<ParamNumber> {
        match self.mode {
            ParamMode::Off => None,
            ParamMode::PendingRpn | ParamMode::Rpn => Some(ParamNumber::Rpn {
                msb: self.rpn.0,
                lsb: self.rpn.1,
            }),
            ParamMode::PendingNrpn | ParamMode::Nrpn => Some(ParamNumber::Nrpn {
                msb: self.nrpn.0,
                lsb: self.nrpn.1,
            }),
        }
    }

    /// PENDING byte of chapter M.
    pub fn pending_byte(&self) -> Option<u8> {
        match self.mode {
            ParamMode::PendingRpn => Some(self.rpn.0 & 0x7F),
            ParamMode::PendingNrpn => Some((self.nrpn.0 & 0x7F) | Q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_walks_transaction() {
        let mut sel = ParamSelect::default();
        assert!(!sel.select(cc::RPN_MSB, 0));
        assert_eq!(sel.mode, ParamMode::PendingRpn);
        assert_eq!(sel.pending_byte(), Some(0));
        sel.select(cc::RPN_LSB, 1);
        assert_eq!(sel.current(), Some(ParamNumber::Rpn { msb: 0, lsb: 1 }));
        assert_eq!(sel.current().and_then(|n| n.tracked()), Some(1));
    }

    #[test]
    fn test_null_selection_closes() {
        let mut sel = ParamSelect::default();
        sel.select(cc::NRPN_MSB, 0x7F);
        assert_eq!(sel.pending_byte(), Some(0xFF));
        assert!(sel.select(cc::NRPN_LSB, 0x7F));
        assert_eq!(sel.mode, ParamMode::Off);
        assert_eq!(sel.current(), None);
    }

    #[test]
    fn test_data_entry_activates_pending() {
        let mut sel = ParamSelect::default();
        sel.select(cc::NRPN_MSB, 5);
        sel.activate();
        assert_eq!(sel.mode, ParamMode::Nrpn);
        assert_eq!(sel.current(), Some(ParamNumber::Nrpn { msb: 5, lsb: 0 }));
    }

    #[test]
    fn test_wire_form() {
        let nrpn = ParamNumber::Nrpn { msb: 3, lsb: 9 };
        assert_eq!(nrpn.to_wire(), [9, 0x83]);
        assert_eq!(ParamNumber::from_wire(9, 0x83), nrpn);
        assert_eq!(nrpn.tracked(), None);
        assert_eq!(ParamNumber::Rpn { msb: 0, lsb: 3 }.tracked(), None);
    }
}
