//! Status bytes and controller numbers.

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

pub const SYSEX: u8 = 0xF0;
pub const QUARTER_FRAME: u8 = 0xF1;
pub const SONG_POSITION: u8 = 0xF2;
pub const SONG_SELECT: u8 = 0xF3;
pub const UNDEFINED_F4: u8 = 0xF4;
pub const UNDEFINED_F5: u8 = 0xF5;
pub const TUNE_REQUEST: u8 = 0xF6;
pub const SYSEX_END: u8 = 0xF7;
pub const CLOCK: u8 = 0xF8;
pub const UNDEFINED_F9: u8 = 0xF9;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;
pub const UNDEFINED_FD: u8 = 0xFD;
pub const ACTIVE_SENSING: u8 = 0xFE;
pub const RESET: u8 = 0xFF;

/// Controller numbers with special meaning to the journal.
pub mod cc {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const MODULATION: u8 = 1;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const VOLUME: u8 = 7;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const SUSTAIN: u8 = 64;
    pub const DATA_INCREMENT: u8 = 96;
    pub const DATA_DECREMENT: u8 = 97;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
    pub const OMNI_OFF: u8 = 124;
    pub const OMNI_ON: u8 = 125;
    pub const MONO_MODE: u8 = 126;
    pub const POLY_MODE: u8 = 127;

    /// Controllers whose journal log carries an alternation count instead of a value.
    #[inline]
    pub fn is_alternating(control: u8) -> bool {
        matches!(control, SUSTAIN | ALL_SOUND_OFF | RESET_ALL_CONTROLLERS)
            || (ALL_NOTES_OFF..=POLY_MODE).contains(&control)
    }
}

/// Number of bytes a command with this status occupies, or `None` for
/// variable-length commands (SysEx, 0xF4/0xF5) and bytes that cannot start one.
#[inline]
pub fn fixed_len(status: u8) -> Option<usize> {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => Some(3),
        0xC0..=0xDF => Some(2),
        QUARTER_FRAME | SONG_SELECT => Some(2),
        SONG_POSITION => Some(3),
        TUNE_REQUEST | CLOCK..=RESET => Some(1),
        _ => None,
    }
}

#[inline]
pub fn is_realtime(status: u8) -> bool {
    status >= CLOCK
}
