//! MIDI 1.0 commands as carried in an RTP-MIDI command section.

use midi_msg::MidiMsg;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::kind::CommandKind;
use crate::status::{self, fixed_len};

/// Inline storage for one command; SysEx bodies spill to the heap.
pub type CommandBytes = SmallVec<[u8; 3]>;

/// One complete MIDI command: a status byte followed by its data bytes.
///
/// Running status is never stored, so every command is self-describing.
/// SysEx commands keep their 0xF0 / 0xF7 framing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiCommand {
    bytes: CommandBytes,
}

impl MidiCommand {
    #[inline]
    fn channel_voice(kind: u8, channel: u8, data: &[u8]) -> Self {
        let mut bytes = CommandBytes::new();
        bytes.push(kind | (channel & 0x0F));
        bytes.extend(data.iter().map(|b| b & 0x7F));
        Self { bytes }
    }

    #[inline]
    fn system(status: u8, data: &[u8]) -> Self {
        let mut bytes = CommandBytes::new();
        bytes.push(status);
        bytes.extend(data.iter().map(|b| b & 0x7F));
        Self { bytes }
    }

    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(status::NOTE_ON, channel, &[note, velocity])
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(status::NOTE_OFF, channel, &[note, velocity])
    }

    #[inline]
    pub fn poly_pressure(channel: u8, note: u8, pressure: u8) -> Self {
        Self::channel_voice(status::POLY_PRESSURE, channel, &[note, pressure])
    }

    #[inline]
    pub fn control_change(channel: u8, control: u8, value: u8) -> Self {
        Self::channel_voice(status::CONTROL_CHANGE, channel, &[control, value])
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::channel_voice(status::PROGRAM_CHANGE, channel, &[program])
    }

    #[inline]
    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::channel_voice(status::CHANNEL_PRESSURE, channel, &[pressure])
    }

    /// Pitch bend with a 14-bit value (0x2000 = center).
    #[inline]
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        Self::channel_voice(
            status::PITCH_BEND,
            channel,
            &[(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8],
        )
    }

    /// SysEx from its payload, without the 0xF0 / 0xF7 framing.
    pub fn sysex(payload: &[u8]) -> Self {
        let mut bytes = CommandBytes::with_capacity(payload.len() + 2);
        bytes.push(status::SYSEX);
        bytes.extend(payload.iter().map(|b| b & 0x7F));
        bytes.push(status::SYSEX_END);
        Self { bytes }
    }

    #[inline]
    pub fn quarter_frame(data: u8) -> Self {
        Self::system(status::QUARTER_FRAME, &[data])
    }

    /// Song position in MIDI beats (sixteenth notes).
    #[inline]
    pub fn song_position(beats: u16) -> Self {
        Self::system(
            status::SONG_POSITION,
            &[(beats & 0x7F) as u8, ((beats >> 7) & 0x7F) as u8],
        )
    }

    #[inline]
    pub fn song_select(song: u8) -> Self {
        Self::system(status::SONG_SELECT, &[song])
    }

    /// Undefined system common command (0xF4 or 0xF5) with any number of data bytes.
    pub fn undefined_common(status: u8, data: &[u8]) -> Result<Self> {
        match status {
            status::UNDEFINED_F4 | status::UNDEFINED_F5 => Ok(Self::system(status, data)),
            other => Err(Error::InvalidStatus(other)),
        }
    }

    /// Any single-byte system real-time command (0xF8..=0xFF).
    pub fn realtime(status: u8) -> Result<Self> {
        if status::is_realtime(status) {
            Ok(Self::system(status, &[]))
        } else {
            Err(Error::InvalidStatus(status))
        }
    }

    #[inline]
    pub fn tune_request() -> Self {
        Self::system(status::TUNE_REQUEST, &[])
    }

    #[inline]
    pub fn clock() -> Self {
        Self::system(status::CLOCK, &[])
    }

    #[inline]
    pub fn start() -> Self {
        Self::system(status::START, &[])
    }

    /// Continue (0xFB).
    #[inline]
    pub fn resume() -> Self {
        Self::system(status::CONTINUE, &[])
    }

    #[inline]
    pub fn stop() -> Self {
        Self::system(status::STOP, &[])
    }

    #[inline]
    pub fn active_sensing() -> Self {
        Self::system(status::ACTIVE_SENSING, &[])
    }

    #[inline]
    pub fn system_reset() -> Self {
        Self::system(status::RESET, &[])
    }

    /// Full status byte, channel nibble included.
    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    /// Channel of a channel-voice command.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        (self.status() < status::SYSEX).then(|| self.status() & 0x0F)
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn kind(&self) -> CommandKind<'_> {
        CommandKind::classify(&self.bytes)
    }

    /// Parses one command from the front of `bytes`, returning it with the
    /// number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let Some(&first) = bytes.first() else {
            return Err(Error::Truncated {
                status: 0,
                needed: 1,
                available: 0,
            });
        };
        if first < 0x80 || first == status::SYSEX_END {
            return Err(Error::InvalidStatus(first));
        }

        let len = match first {
            status::SYSEX => {
                let end = bytes[1..].iter().position(|&b| b >= 0x80);
                match end {
                    Some(i) if bytes[i + 1] == status::SYSEX_END => i + 2,
                    Some(i) => {
                        return Err(Error::Truncated {
                            status: first,
                            needed: i + 2,
                            available: i + 1,
                        })
                    }
                    None => {
                        return Err(Error::Truncated {
                            status: first,
                            needed: bytes.len() + 1,
                            available: bytes.len(),
                        })
                    }
                }
            }
            status::UNDEFINED_F4 | status::UNDEFINED_F5 => {
                1 + bytes[1..].iter().take_while(|&&b| b < 0x80).count()
            }
            _ => {
                let needed = fixed_len(first).ok_or(Error::InvalidStatus(first))?;
                let available = 1 + bytes[1..]
                    .iter()
                    .take(needed - 1)
                    .take_while(|&&b| b < 0x80)
                    .count();
                if available < needed {
                    return Err(Error::Truncated {
                        status: first,
                        needed,
                        available,
                    });
                }
                needed
            }
        };

        Ok((
            Self {
                bytes: CommandBytes::from_slice(&bytes[..len]),
            },
            len,
        ))
    }

    /// Parses a byte stream of back-to-back commands.
    pub fn parse_all(mut bytes: &[u8]) -> Result<Vec<Self>> {
        let mut commands = Vec::new();
        while !bytes.is_empty() {
            let (command, used) = Self::from_bytes(bytes)?;
            commands.push(command);
            bytes = &bytes[used..];
        }
        Ok(commands)
    }

    pub fn to_midi_msg(&self) -> Result<MidiMsg> {
        let (msg, _len) = MidiMsg::from_midi(&self.bytes)?;
        Ok(msg)
    }

    /// Converts a `midi_msg` message; high-resolution controller messages
    /// expand to more than one command.
    pub fn from_midi_msg(msg: &MidiMsg) -> Result<Vec<Self>> {
        Self::parse_all(&msg.to_midi())
    }
}

impl TryFrom<&[u8]> for MidiCommand {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let (command, used) = Self::from_bytes(bytes)?;
        if used != bytes.len() {
            return Err(Error::InvalidStatus(bytes[used]));
        }
        Ok(command)
    }
}
