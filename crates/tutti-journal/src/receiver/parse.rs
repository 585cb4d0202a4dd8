//! Strict journal parser.
//!
//! The whole journal is parsed and bounds-checked before any of it is acted
//! on, so a corrupted journal never leaves repairs half applied.

use crate::error::{Error, Result};
use crate::mtc::Timecode;
use crate::param::ParamNumber;
use crate::sequencer::Sequencer;
use crate::sysex::SysexContent;
use crate::wire::{
    channel, control, extras, get_len10, journal, note, param, program, sequencer, simple,
    sysex, system, timecode, DATA, S,
};
use smallvec::SmallVec;
use tracing::debug;

/// A parsed value with the S bit it was sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Item<T> {
    pub stale: bool,
    pub value: T,
}

impl<T> Item<T> {
    fn new(first: u8, value: T) -> Self {
        Self {
            stale: first & S != 0,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub stale: bool,
    pub system: bool,
    pub channels: usize,
    pub checkpoint: u16,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let [flags, hi, lo] = match bytes {
            [a, b, c, ..] => [*a, *b, *c],
            _ => return Err(Error::corrupted(bytes.len(), "truncated journal header")),
        };
        Ok(Self {
            stale: flags & S != 0,
            system: flags & journal::Y != 0,
            channels: if flags & journal::A != 0 {
                usize::from(flags & journal::CHANNELS) + 1
            } else {
                0
            },
            checkpoint: u16::from_be_bytes([hi, lo]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Journal {
    pub header: Header,
    pub system: Option<SystemSection>,
    pub channels: Vec<ChannelSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SystemSection {
    pub simple: Option<SimpleSection>,
    pub sense: Option<Item<u8>>,
    pub sequencer: Option<Item<Sequencer>>,
    pub timecode: Option<Item<Timecode>>,
    /// Chapter X; the first log's S bit speaks for the chapter.
    pub sysex: Option<Item<Vec<SysexLog>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SimpleSection {
    pub reset: Option<Item<u8>>,
    pub tune: Option<Item<u8>>,
    pub song: Option<Item<u8>>,
    pub commons: [Option<Item<CommonLog>>; 2],
    /// Count, when the log carries one.
    pub realtimes: [Option<Item<Option<u8>>>; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommonLog {
    pub count: Option<u8>,
    pub data: SmallVec<[u8; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SysexLog {
    pub tcount: Option<u8>,
    /// None for content this end does not act on.
    pub content: Option<SysexContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgramSection {
    pub program: u8,
    /// Present when the sender had selected a bank.
    pub bank: Option<(u8, u8)>,
}

/// A log keyed by a 7-bit number: controller or poly pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyedLog {
    pub stale: bool,
    pub key: u8,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParamEntry {
    pub stale: bool,
    pub number: ParamNumber,
    pub entry_msb: Option<u8>,
    pub entry_lsb: Option<u8>,
    pub button: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParamSection {
    pub stale: bool,
    /// Parameter whose MSB was selected without an LSB yet.
    pub pending: Option<ParamNumber>,
    pub active: bool,
    pub logs: Vec<ParamEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NoteEntry {
    pub stale: bool,
    pub note: u8,
    pub velocity: u8,
    /// The "play now" hint.
    pub play: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteSection {
    /// B bit: the bitfield only matters after multiple losses.
    pub offs_stale: bool,
    pub logs: Vec<NoteEntry>,
    pub offs: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChannelSection {
    pub channel: u8,
    pub program: Option<Item<ProgramSection>>,
    pub controllers: Option<Item<Vec<KeyedLog>>>,
    pub params: Option<ParamSection>,
    pub wheel: Option<Item<[u8; 2]>>,
    pub notes: Option<NoteSection>,
    pub pressure: Option<Item<u8>>,
    pub poly: Option<Item<Vec<KeyedLog>>>,
}

/// Bounds-checked cursor. Offsets in errors are relative to the journal start.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    #[inline]
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn corrupted(&self, reason: &'static str) -> Error {
        Error::corrupted(self.offset(), reason)
    }

    fn peek(&self, reason: &'static str) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.corrupted(reason))
    }

    fn byte(&mut self, reason: &'static str) -> Result<u8> {
        let byte = self.peek(reason)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize, reason: &'static str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.corrupted(reason));
        }
        let bytes = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, reason: &'static str) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N, reason)?);
        Ok(out)
    }

    /// Splits off the next `len` bytes as their own reader.
    fn section(&mut self, len: usize, reason: &'static str) -> Result<Reader<'a>> {
        let base = self.offset();
        let bytes = self.take(len, reason)?;
        Ok(Reader {
            bytes,
            pos: 0,
            base,
        })
    }

    fn finish(&self, reason: &'static str) -> Result<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(self.corrupted(reason))
        }
    }
}

impl Journal {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;
        let mut r = Reader::new(bytes);
        r.take(journal::SIZE, "truncated journal header")?;

        let system = if header.system {
            Some(parse_system(&mut r)?)
        } else {
            None
        };
        let channels = (0..header.channels)
            .map(|_| parse_channel(&mut r))
            .collect::<Result<Vec<_>>>()?;
        r.finish("trailing bytes after journal")?;

        Ok(Self {
            header,
            system,
            channels,
        })
    }
}

fn section_len(r: &mut Reader<'_>, min: usize, reason: &'static str) -> Result<(u8, usize)> {
    let head = r.array::<2>(reason)?;
    let len = get_len10(head);
    if len < min {
        return Err(r.corrupted(reason));
    }
    Ok((head[0], len))
}

fn parse_system(r: &mut Reader<'_>) -> Result<SystemSection> {
    let at = r.offset();
    let (flags, len) = section_len(r, system::SIZE, "bad system journal length")?;
    let mut s = r
        .section(len - system::SIZE, "system journal overruns packet")
        .map_err(|_| Error::corrupted(at, "system journal overruns packet"))?;
    let mut out = SystemSection::default();

    if flags & system::D != 0 {
        out.simple = Some(parse_simple(&mut s)?);
    }
    if flags & system::V != 0 {
        let b = s.byte("truncated chapter V")?;
        out.sense = Some(Item::new(b, b & DATA));
    }
    if flags & system::Q != 0 {
        let head = s.byte("truncated chapter Q")?;
        let clock = if head & sequencer::C != 0 {
            let [hi, lo] = s.array::<2>("truncated chapter Q clock")?;
            Some(
                (u32::from(head & sequencer::TOP) << 16) | (u32::from(hi) << 8) | u32::from(lo),
            )
        } else {
            None
        };
        if head & sequencer::T != 0 {
            s.take(sequencer::TIMETOOLS_SIZE, "truncated chapter Q timetools")?;
        }
        out.sequencer = Some(Item::new(
            head,
            Sequencer {
                running: head & sequencer::N != 0,
                downbeat: head & sequencer::D != 0,
                clock,
            },
        ));
    }
    if flags & system::F != 0 {
        let head = s.byte("truncated chapter F")?;
        let complete = if head & timecode::C != 0 {
            Some(s.array::<4>("truncated chapter F complete")?)
        } else {
            None
        };
        let partial = if head & timecode::P != 0 {
            Some(s.array::<4>("truncated chapter F partial")?)
        } else {
            None
        };
        out.timecode = Some(Item::new(
            head,
            Timecode::from_fields(
                complete,
                head & timecode::Q != 0,
                partial,
                head & timecode::D != 0,
                head & timecode::POINT,
            ),
        ));
    }
    if flags & system::X != 0 {
        let first = s.peek("empty chapter X")?;
        let mut logs = Vec::new();
        while s.remaining() > 0 {
            logs.push(parse_sysex_log(&mut s)?);
        }
        out.sysex = Some(Item::new(first, logs));
    }
    s.finish("system journal length mismatch")?;
    Ok(out)
}

fn parse_simple(s: &mut Reader<'_>) -> Result<SimpleSection> {
    let toc = s.byte("truncated chapter D")?;
    let mut out = SimpleSection::default();

    let mut count = |flag: u8, reason: &'static str| -> Result<Option<Item<u8>>> {
        if toc & flag == 0 {
            return Ok(None);
        }
        let b = s.byte(reason)?;
        Ok(Some(Item::new(b, b & DATA)))
    };
    out.reset = count(simple::B, "truncated chapter D reset")?;
    out.tune = count(simple::G, "truncated chapter D tune request")?;
    out.song = count(simple::H, "truncated chapter D song select")?;

    for (i, flag) in [simple::J, simple::K].into_iter().enumerate() {
        if toc & flag != 0 {
            out.commons[i] = Some(parse_common(s)?);
        }
    }
    for (i, flag) in [simple::Y, simple::Z].into_iter().enumerate() {
        if toc & flag == 0 {
            continue;
        }
        let head = s.peek("truncated chapter D real-time log")?;
        let len = usize::from(head & simple::REALTIME_LEN);
        let mut log = s.section(len, "chapter D real-time log overruns")?;
        log.byte("empty chapter D real-time log")?;
        let count = if head & simple::REALTIME_C != 0 {
            Some(log.byte("chapter D real-time log lacks its count")?)
        } else {
            None
        };
        out.realtimes[i] = Some(Item::new(head, count));
    }
    Ok(out)
}

fn parse_common(s: &mut Reader<'_>) -> Result<Item<CommonLog>> {
    let [head, len] = s.array::<2>("truncated chapter D common log")?;
    let len = usize::from(len);
    if len < simple::COMMON_HDR_SIZE {
        return Err(s.corrupted("bad chapter D common log length"));
    }
    let mut log = s.section(len - simple::COMMON_HDR_SIZE, "chapter D common log overruns")?;
    let count = if head & simple::COMMON_C != 0 {
        Some(log.byte("chapter D common log lacks its count")?)
    } else {
        None
    };
    let mut data = SmallVec::new();
    if head & simple::COMMON_V != 0 {
        loop {
            let b = log.byte("unterminated chapter D common value")?;
            data.push(b & DATA);
            if b & simple::END != 0 {
                break;
            }
        }
    }
    Ok(Item::new(head, CommonLog { count, data }))
}

fn parse_sysex_log(s: &mut Reader<'_>) -> Result<SysexLog> {
    let head = s.byte("truncated chapter X log")?;
    let tcount = if head & sysex::T != 0 {
        Some(s.byte("truncated chapter X TCOUNT")? & DATA)
    } else {
        None
    };
    if head & sysex::C != 0 {
        s.byte("truncated chapter X COUNT")?;
    }
    let mut first = 0u32;
    if head & sysex::F != 0 {
        loop {
            let b = s.byte("truncated chapter X FIRST")?;
            first = (first << 7) | u32::from(b & DATA);
            if b & sysex::END == 0 {
                break;
            }
        }
    }
    let mut data: SmallVec<[u8; 8]> = SmallVec::new();
    if head & sysex::D != 0 {
        loop {
            let b = s.byte("unterminated chapter X data")?;
            data.push(b & DATA);
            if b & sysex::END != 0 {
                break;
            }
        }
    }

    let status = head & sysex::STA;
    let usable = first == 0 && status != sysex::STA_UNFINISHED && status != sysex::STA_CANCELLED;
    let content = if usable {
        SysexContent::recognize(&data)
            .inspect_err(|e| debug!(error = %e, "Skipping chapter X log"))
            .ok()
    } else {
        None
    };
    Ok(SysexLog { tcount, content })
}

fn parse_channel(r: &mut Reader<'_>) -> Result<ChannelSection> {
    let at = r.offset();
    let (head, len) = section_len(r, channel::SIZE, "bad channel journal length")?;
    let toc = r.byte("truncated channel journal header")?;
    let mut c = r
        .section(len - channel::SIZE, "channel journal overruns packet")
        .map_err(|_| Error::corrupted(at, "channel journal overruns packet"))?;

    let mut out = ChannelSection {
        channel: (head & channel::CHAN_MASK) >> channel::CHAN_SHIFT,
        program: None,
        controllers: None,
        params: None,
        wheel: None,
        notes: None,
        pressure: None,
        poly: None,
    };

    if toc & channel::TOC_P != 0 {
        let [p, msb, lsb] = c.array::<{ program::SIZE }>("truncated chapter P")?;
        out.program = Some(Item::new(
            p,
            ProgramSection {
                program: p & DATA,
                bank: (msb & program::B != 0).then_some((msb & DATA, lsb & DATA)),
            },
        ));
    }
    if toc & channel::TOC_C != 0 {
        out.controllers = Some(parse_keyed(&mut c, "truncated chapter C")?);
    }
    if toc & channel::TOC_M != 0 {
        out.params = Some(parse_params(&mut c)?);
    }
    if toc & channel::TOC_W != 0 {
        let [first, second] = c.array::<2>("truncated chapter W")?;
        out.wheel = Some(Item::new(first, [first & DATA, second & DATA]));
    }
    if toc & channel::TOC_N != 0 {
        out.notes = Some(parse_notes(&mut c)?);
    }
    if toc & channel::TOC_E != 0 {
        let head = c.byte("truncated chapter E")?;
        let logs = usize::from(head & DATA) + 1;
        c.take(logs * extras::LOG_SIZE, "truncated chapter E logs")?;
    }
    if toc & channel::TOC_T != 0 {
        let b = c.byte("truncated chapter T")?;
        out.pressure = Some(Item::new(b, b & DATA));
    }
    if toc & channel::TOC_A != 0 {
        out.poly = Some(parse_keyed(&mut c, "truncated chapter A")?);
    }
    c.finish("channel journal length mismatch")?;
    Ok(out)
}

fn parse_keyed(c: &mut Reader<'_>, reason: &'static str) -> Result<Item<Vec<KeyedLog>>> {
    let head = c.byte(reason)?;
    let count = usize::from(head & DATA) + 1;
    let bytes = c.take(count * control::LOG_SIZE, reason)?;
    let logs = bytes
        .chunks_exact(control::LOG_SIZE)
        .map(|log| KeyedLog {
            stale: log[0] & S != 0,
            key: log[0] & DATA,
            value: log[1],
        })
        .collect();
    Ok(Item::new(head, logs))
}

fn parse_params(c: &mut Reader<'_>) -> Result<ParamSection> {
    let at = c.offset();
    let head = c.array::<{ param::HDR_SIZE }>("truncated chapter M")?;
    let len = get_len10(head);
    if len < param::HDR_SIZE {
        return Err(Error::corrupted(at, "bad chapter M length"));
    }
    let mut m = c.section(len - param::HDR_SIZE, "chapter M overruns channel journal")?;
    let flags = head[0];

    let pending = if flags & param::P != 0 {
        Some(ParamNumber::from_wire(0, m.byte("truncated chapter M pending")?))
    } else {
        None
    };

    // With Z and one of U / W, logs omit the MSB byte: every parameter is
    // an RPN (U) or NRPN (W) with MSB 0.
    let shortcut = (flags & param::Z != 0 && flags & (param::U | param::W) != 0)
        .then_some(flags & param::U == 0);

    let mut logs = Vec::new();
    while m.remaining() > 0 {
        let first = m.byte("truncated chapter M log")?;
        let lsb = first & DATA;
        let number = match shortcut {
            Some(false) => ParamNumber::Rpn { msb: 0, lsb },
            Some(true) => ParamNumber::Nrpn { msb: 0, lsb },
            None => ParamNumber::from_wire(lsb, m.byte("truncated chapter M log")?),
        };
        let toc = m.byte("truncated chapter M log")?;

        let entry_msb = if toc & param::TOC_J != 0 {
            Some(m.byte("truncated chapter M entry MSB")? & DATA)
        } else {
            None
        };
        let entry_lsb = if toc & param::TOC_K != 0 {
            Some(m.byte("truncated chapter M entry LSB")? & DATA)
        } else {
            None
        };
        if toc & param::TOC_L != 0 {
            m.take(param::BUTTON_SIZE, "truncated chapter M A-button")?;
        }
        let button = if toc & param::TOC_M != 0 {
            let [hi, lo] = m.array::<2>("truncated chapter M C-button")?;
            let magnitude = (i16::from(hi & 0x3F) << 8) | i16::from(lo);
            Some(if hi & param::G != 0 {
                -magnitude
            } else {
                magnitude
            })
        } else {
            None
        };
        if toc & param::TOC_N != 0 {
            m.take(param::COUNT_SIZE, "truncated chapter M count")?;
        }

        logs.push(ParamEntry {
            stale: first & S != 0,
            number,
            entry_msb,
            entry_lsb,
            button,
        });
    }

    Ok(ParamSection {
        stale: flags & S != 0,
        pending,
        active: flags & param::E != 0,
        logs,
    })
}

fn parse_notes(c: &mut Reader<'_>) -> Result<NoteSection> {
    let [len, range] = c.array::<{ note::HDR_SIZE }>("truncated chapter N")?;
    let low = range >> note::LOW_SHIFT;
    let high = range & note::HIGH_MASK;
    let mut count = usize::from(len & DATA);
    if count == 127 && low == note::EMPTY_LOW && high == 0 {
        count = note::MAX_LOGS;
    }

    let bytes = c.take(count * note::LOG_SIZE, "truncated chapter N logs")?;
    let logs = bytes
        .chunks_exact(note::LOG_SIZE)
        .map(|log| NoteEntry {
            stale: log[0] & S != 0,
            note: log[0] & DATA,
            velocity: log[1] & DATA,
            play: log[1] & note::Y != 0,
        })
        .collect();

    let mut offs = Vec::new();
    if low <= high {
        let field = c.take(usize::from(high - low) + 1, "truncated chapter N bitfield")?;
        for (i, &byte) in field.iter().enumerate() {
            let base = (usize::from(low) + i) * 8;
            offs.extend((0..8u8).filter(|bit| byte & (0x80 >> bit) != 0).map(|bit| (base as u8) + bit));
        }
    }

    Ok(NoteSection {
        offs_stale: len & note::B != 0,
        logs,
        offs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only() {
        let journal = Journal::parse(&[0x80, 0x12, 0x34]).unwrap();
        assert!(journal.header.stale);
        assert_eq!(journal.header.checkpoint, 0x1234);
        assert!(journal.system.is_none());
        assert!(journal.channels.is_empty());
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            Journal::parse(&[0x20, 0x00]),
            Err(Error::Corrupted { offset: 2, .. })
        ));
    }

    #[test]
    fn test_channel_with_notes() {
        // Channel 0: N with one log (60, Y, 100) and offs for notes 9 and 30.
        let bytes = [
            0x20, 0x00, 0x05, 0x00, 0x0A, 0x08, 0x01, 0x13, 0x3C, 0xE4, 0x40, 0x00, 0x02,
        ];
        let journal = Journal::parse(&bytes).unwrap();
        let notes = journal.channels[0].notes.as_ref().unwrap();
        assert!(!notes.offs_stale);
        assert_eq!(
            notes.logs,
            vec![NoteEntry {
                stale: false,
                note: 60,
                velocity: 100,
                play: true
            }]
        );
        assert_eq!(notes.offs, vec![9, 30]);
    }

    #[test]
    fn test_channel_length_overrun() {
        // Declares 20 bytes, carries 6.
        let bytes = [0x20, 0x00, 0x00, 0x00, 0x14, 0x80, 0x05, 0x00, 0x00];
        assert!(matches!(
            Journal::parse(&bytes),
            Err(Error::Corrupted { offset: 3, .. })
        ));
    }

    #[test]
    fn test_chapter_overruns_channel() {
        // Chapter C claims two logs but the channel holds one.
        let bytes = [0x20, 0x00, 0x00, 0x00, 0x06, 0x40, 0x01, 0x07, 0x64];
        assert!(Journal::parse(&bytes).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(Journal::parse(&[0x00, 0x00, 0x00, 0xFF]).is_err());
    }

    #[test]
    fn test_param_shortcut_logs() {
        // Z|U: logs omit the MSB byte and are all RPNs with MSB 0.
        let bytes = [0x20, 0x00, 0x00, 0x00, 0x08, 0x20, 0x34, 0x05, 0x01, 0x80, 0x0C];
        let journal = Journal::parse(&bytes).unwrap();
        let params = journal.channels[0].params.as_ref().unwrap();
        assert!(params.active);
        assert_eq!(params.logs[0].number, ParamNumber::Rpn { msb: 0, lsb: 1 });
        assert_eq!(params.logs[0].entry_msb, Some(12));
    }

    #[test]
    fn test_unrecognized_sysex_is_parsed_and_ignored() {
        // System journal: X with one log of vendor data.
        let bytes = [0x40, 0x00, 0x00, 0x04, 0x06, 0x0B, 0x43, 0x10, 0x81];
        let journal = Journal::parse(&bytes).unwrap();
        let sysex = journal.system.unwrap().sysex.unwrap();
        assert_eq!(sysex.value, vec![SysexLog { tcount: None, content: None }]);
    }
}
