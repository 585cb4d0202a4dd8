//! Bit layout of the recovery journal.
//!
//! Every first byte of a journal section, chapter or log carries the S bit
//! in its MSB. Lengths marked "10 bits" span the low bits of the first byte
//! and all of the second, and include the section's own header.

/// Set when the item only matters to receivers that lost more than one packet.
pub const S: u8 = 0x80;
/// Low seven bits of a data byte.
pub const DATA: u8 = 0x7F;
/// Largest value of a 10-bit length field.
pub const MAX_LEN10: usize = 0x03FF;

/// Packs a 10-bit length into the two bytes following the flag bits.
#[inline]
pub fn put_len10(flags: u8, len: usize) -> [u8; 2] {
    [flags | ((len >> 8) as u8 & 0x03), len as u8]
}

#[inline]
pub fn get_len10(bytes: [u8; 2]) -> usize {
    (usize::from(bytes[0] & 0x03) << 8) | usize::from(bytes[1])
}

/// Journal header.
pub mod journal {
    pub const SIZE: usize = 3;
    pub const Y: u8 = 0x40;
    pub const A: u8 = 0x20;
    pub const H: u8 = 0x10;
    pub const CHANNELS: u8 = 0x0F;
}

/// System journal header.
pub mod system {
    pub const SIZE: usize = 2;
    pub const D: u8 = 0x40;
    pub const V: u8 = 0x20;
    pub const Q: u8 = 0x10;
    pub const F: u8 = 0x08;
    pub const X: u8 = 0x04;
}

/// Channel journal header.
pub mod channel {
    pub const SIZE: usize = 3;
    pub const CHAN_MASK: u8 = 0x78;
    pub const CHAN_SHIFT: u8 = 3;
    pub const H: u8 = 0x04;

    pub const TOC_P: u8 = 0x80;
    pub const TOC_C: u8 = 0x40;
    pub const TOC_M: u8 = 0x20;
    pub const TOC_W: u8 = 0x10;
    pub const TOC_N: u8 = 0x08;
    pub const TOC_E: u8 = 0x04;
    pub const TOC_T: u8 = 0x02;
    pub const TOC_A: u8 = 0x01;
}

/// Chapter P: program change.
pub mod program {
    pub const SIZE: usize = 3;
    pub const B: u8 = 0x80;
    pub const X: u8 = 0x80;
}

/// Chapter C: controllers.
pub mod control {
    pub const HDR_SIZE: usize = 1;
    pub const LOG_SIZE: usize = 2;
    pub const A: u8 = 0x80;
    pub const T: u8 = 0x40;
    pub const COUNT: u8 = 0x3F;
}

/// Chapter M: parameter system.
pub mod param {
    pub const HDR_SIZE: usize = 2;
    pub const PENDING_SIZE: usize = 1;
    pub const LOG_HDR_SIZE: usize = 3;
    pub const ENTRY_SIZE: usize = 1;
    pub const BUTTON_SIZE: usize = 2;
    pub const COUNT_SIZE: usize = 1;

    pub const P: u8 = 0x40;
    pub const E: u8 = 0x20;
    pub const U: u8 = 0x10;
    pub const W: u8 = 0x08;
    pub const Z: u8 = 0x04;

    /// NRPN marker on the PENDING byte and the parameter MSB byte.
    pub const Q: u8 = 0x80;

    pub const TOC_J: u8 = 0x80;
    pub const TOC_K: u8 = 0x40;
    pub const TOC_L: u8 = 0x20;
    pub const TOC_M: u8 = 0x10;
    pub const TOC_N: u8 = 0x08;
    pub const TOC_T: u8 = 0x04;
    pub const TOC_V: u8 = 0x02;
    pub const TOC_X: u8 = 0x01;

    /// Sign bit of the C-button field.
    pub const G: u8 = 0x80;
    pub const BUTTON_LIMIT: i16 = 0x3FFF;
}

/// Chapter W: pitch wheel.
pub mod wheel {
    pub const SIZE: usize = 2;
}

/// Chapter N: note on/off.
pub mod note {
    pub const HDR_SIZE: usize = 2;
    pub const LOG_SIZE: usize = 2;
    /// Stale marker of the off-bitfield, in the length byte.
    pub const B: u8 = 0x80;
    /// "Play now" hint on the velocity byte.
    pub const Y: u8 = 0x80;
    pub const LOW_SHIFT: u8 = 4;
    pub const HIGH_MASK: u8 = 0x0F;
    /// LOW/HIGH pair of an empty bitfield.
    pub const EMPTY_LOW: u8 = 15;
    pub const EMPTY_HIGH: u8 = 1;
    pub const MAX_LOGS: usize = 128;

    #[inline]
    pub fn bit(note: u8) -> u8 {
        1 << (7 - (note & 7))
    }
}

/// Chapter E: note extras.
pub mod extras {
    pub const HDR_SIZE: usize = 1;
    pub const LOG_SIZE: usize = 2;
    /// Set on velocity logs, clear on count logs.
    pub const V: u8 = 0x80;
    pub const MAX_LOGS: usize = 128;
    pub const MAX_COUNT: u8 = 127;
}

/// Chapter T: channel aftertouch.
pub mod pressure {
    pub const SIZE: usize = 1;
}

/// Chapter A: poly aftertouch.
pub mod poly {
    pub const HDR_SIZE: usize = 1;
    pub const LOG_SIZE: usize = 2;
    pub const X: u8 = 0x80;
}

/// Chapter D: simple system commands.
pub mod simple {
    pub const TOC_SIZE: usize = 1;
    pub const B: u8 = 0x40;
    pub const G: u8 = 0x20;
    pub const H: u8 = 0x10;
    pub const J: u8 = 0x08;
    pub const K: u8 = 0x04;
    pub const Y: u8 = 0x02;
    pub const Z: u8 = 0x01;

    pub const COMMON_C: u8 = 0x40;
    pub const COMMON_V: u8 = 0x20;
    pub const COMMON_L: u8 = 0x10;
    pub const COMMON_DSZ: u8 = 0x03;
    /// TOC plus LENGTH.
    pub const COMMON_HDR_SIZE: usize = 2;

    pub const REALTIME_C: u8 = 0x40;
    pub const REALTIME_L: u8 = 0x20;
    pub const REALTIME_LEN: u8 = 0x1F;
    pub const REALTIME_SIZE: usize = 2;

    /// Marks the last value byte of a common log.
    pub const END: u8 = 0x80;
}

/// Chapter V: active sense.
pub mod sense {
    pub const SIZE: usize = 1;
}

/// Chapter Q: sequencer state.
pub mod sequencer {
    pub const HDR_SIZE: usize = 1;
    pub const CLOCK_SIZE: usize = 2;
    pub const TIMETOOLS_SIZE: usize = 3;
    pub const N: u8 = 0x40;
    pub const D: u8 = 0x20;
    pub const C: u8 = 0x10;
    pub const T: u8 = 0x08;
    pub const TOP: u8 = 0x07;
}

/// Chapter F: MIDI time code.
pub mod timecode {
    pub const HDR_SIZE: usize = 1;
    pub const FIELD_SIZE: usize = 4;
    pub const C: u8 = 0x40;
    pub const P: u8 = 0x20;
    pub const Q: u8 = 0x10;
    pub const D: u8 = 0x08;
    pub const POINT: u8 = 0x07;
}

/// Chapter X: system exclusive.
pub mod sysex {
    pub const T: u8 = 0x40;
    pub const C: u8 = 0x20;
    pub const F: u8 = 0x10;
    pub const D: u8 = 0x08;
    pub const L: u8 = 0x04;
    pub const STA: u8 = 0x03;

    pub const STA_UNFINISHED: u8 = 0x00;
    pub const STA_CANCELLED: u8 = 0x01;
    pub const STA_NORMAL: u8 = 0x03;

    pub const END: u8 = 0x80;
    pub const MAX_SLOTS: usize = 3;

    /// Header of the logs this sender writes: TCOUNT + DATA, normal status.
    pub const LOG_HDR: u8 = T | D | STA_NORMAL;

    pub const GM_RESET: [u8; 3] = [0x7E, 0x7F, 0x09];
    pub const GM_ON: u8 = 0x01;
    pub const GM_OFF: u8 = 0x02;
    pub const MASTER_VOLUME: [u8; 4] = [0x7F, 0x7F, 0x04, 0x01];
}
