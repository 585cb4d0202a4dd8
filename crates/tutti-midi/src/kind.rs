//! Command classification.

use crate::status;

/// What a command does, decoded from its bytes.
///
/// This is the dispatch key the recovery journal uses to route a command to
/// the chapter that logs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind<'a> {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    PitchBend { channel: u8, value: u16 },
    /// SysEx payload without framing.
    SysEx(&'a [u8]),
    QuarterFrame(u8),
    SongPosition(u16),
    SongSelect(u8),
    /// 0xF4 or 0xF5.
    UndefinedCommon { status: u8, data: &'a [u8] },
    TuneRequest,
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
    /// 0xF9 or 0xFD.
    UndefinedRealtime(u8),
}

impl<'a> CommandKind<'a> {
    pub(crate) fn classify(bytes: &'a [u8]) -> Self {
        let at = |i: usize| bytes.get(i).copied().unwrap_or(0);
        let first = at(0);
        let channel = first & 0x0F;

        match first & 0xF0 {
            status::NOTE_OFF => Self::NoteOff {
                channel,
                note: at(1),
                velocity: at(2),
            },
            status::NOTE_ON => Self::NoteOn {
                channel,
                note: at(1),
                velocity: at(2),
            },
            status::POLY_PRESSURE => Self::PolyPressure {
                channel,
                note: at(1),
                pressure: at(2),
            },
            status::CONTROL_CHANGE => Self::ControlChange {
                channel,
                control: at(1),
                value: at(2),
            },
            status::PROGRAM_CHANGE => Self::ProgramChange {
                channel,
                program: at(1),
            },
            status::CHANNEL_PRESSURE => Self::ChannelPressure {
                channel,
                pressure: at(1),
            },
            status::PITCH_BEND => Self::PitchBend {
                channel,
                value: u16::from(at(1)) | (u16::from(at(2)) << 7),
            },
            _ => match first {
                status::SYSEX => {
                    let end = bytes.len().saturating_sub(1).max(1);
                    Self::SysEx(bytes.get(1..end).unwrap_or(&[]))
                }
                status::QUARTER_FRAME => Self::QuarterFrame(at(1)),
                status::SONG_POSITION => {
                    Self::SongPosition(u16::from(at(1)) | (u16::from(at(2)) << 7))
                }
                status::SONG_SELECT => Self::SongSelect(at(1)),
                status::TUNE_REQUEST => Self::TuneRequest,
                status::CLOCK => Self::Clock,
                status::START => Self::Start,
                status::CONTINUE => Self::Continue,
                status::STOP => Self::Stop,
                status::ACTIVE_SENSING => Self::ActiveSensing,
                status::RESET => Self::Reset,
                status::UNDEFINED_F9 | status::UNDEFINED_FD => Self::UndefinedRealtime(first),
                _ => Self::UndefinedCommon {
                    status: first,
                    data: bytes.get(1..).unwrap_or(&[]),
                },
            },
        }
    }

    #[inline]
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Self::NoteOff { channel, .. }
            | Self::NoteOn { channel, .. }
            | Self::PolyPressure { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// NoteOn with velocity 0 is a NoteOff.
    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self,
            Self::NoteOff { .. } | Self::NoteOn { velocity: 0, .. }
        )
    }
}
