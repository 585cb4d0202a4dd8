//! The SysEx commands chapter X protects.
//!
//! Only two shapes are journaled: GM System On/Off and Master Volume, both
//! addressed to all devices. Anything else is sent unprotected.

use crate::error::{Error, Result};
use crate::wire::sysex::{END, GM_OFF, GM_ON, GM_RESET, LOG_HDR, MASTER_VOLUME};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysexContent {
    /// GM System On (1) or Off (2).
    GmReset(u8),
    MasterVolume { lsb: u8, msb: u8 },
}

impl SysexContent {
    /// Recognizes a SysEx payload, framing bytes excluded.
    pub fn recognize(payload: &[u8]) -> Result<Self> {
        match payload {
            [a, b, c, value] if [*a, *b, *c] == GM_RESET && matches!(*value, GM_ON | GM_OFF) => {
                Ok(Self::GmReset(*value))
            }
            [a, b, c, d, lsb, msb] if [*a, *b, *c, *d] == MASTER_VOLUME => Ok(Self::MasterVolume {
                lsb: lsb & 0x7F,
                msb: msb & 0x7F,
            }),
            _ => Err(Error::UnsupportedContent(
                "SysEx other than GM System On/Off or Master Volume",
            )),
        }
    }

    /// Which recency slot the command occupies. GM On and GM Off are tracked apart.
    #[inline]
    pub fn slot(&self) -> usize {
        match self {
            Self::GmReset(GM_ON) => 0,
            Self::GmReset(_) => 1,
            Self::MasterVolume { .. } => 2,
        }
    }

    /// The payload as a journal DATA field, END on its last byte.
    pub fn data(&self) -> SmallVec<[u8; 6]> {
        let mut data = SmallVec::new();
        match *self {
            Self::GmReset(value) => {
                data.extend_from_slice(&GM_RESET);
                data.push(value | END);
            }
            Self::MasterVolume { lsb, msb } => {
                data.extend_from_slice(&MASTER_VOLUME);
                data.push(lsb);
                data.push(msb | END);
            }
        }
        data
    }

    /// A complete chapter X log for this command.
    pub fn log(&self, tcount: u8) -> SmallVec<[u8; 8]> {
        let mut log = SmallVec::new();
        log.push(LOG_HDR);
        log.push(tcount & 0x7F);
        log.extend_from_slice(&self.data());
        log
    }

    /// The SysEx payload that re-issues this command.
    pub fn payload(&self) -> SmallVec<[u8; 6]> {
        let mut payload = self.data();
        if let Some(last) = payload.last_mut() {
            *last &= !END;
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_two_shapes() {
        assert_eq!(
            SysexContent::recognize(&[0x7E, 0x7F, 0x09, 0x01]),
            Ok(SysexContent::GmReset(1))
        );
        assert_eq!(
            SysexContent::recognize(&[0x7F, 0x7F, 0x04, 0x01, 0x10, 0x60]),
            Ok(SysexContent::MasterVolume {
                lsb: 0x10,
                msb: 0x60
            })
        );
        assert!(matches!(
            SysexContent::recognize(&[0x7E, 0x7F, 0x09, 0x03]),
            Err(Error::UnsupportedContent(_))
        ));
        assert!(matches!(
            SysexContent::recognize(&[0x43, 0x10, 0x4C]),
            Err(Error::UnsupportedContent(_))
        ));
    }

    #[test]
    fn test_log_layout() {
        let volume = SysexContent::MasterVolume { lsb: 0, msb: 0x40 };
        assert_eq!(
            volume.log(3).as_slice(),
            &[0x4B, 3, 0x7F, 0x7F, 0x04, 0x01, 0x00, 0xC0]
        );
        assert_eq!(SysexContent::GmReset(2).log(1).len(), 6);
        assert_eq!(
            volume.payload().as_slice(),
            &[0x7F, 0x7F, 0x04, 0x01, 0x00, 0x40]
        );
    }
}
