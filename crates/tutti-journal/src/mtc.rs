//! MIDI time code quarter-frame tracking.
//!
//! Quarter frames carry a 3-bit id and a 4-bit value. Eight of them make a
//! frame, packed two per byte: even ids fill the high nibble, odd ids the low.
//! Running forward, the frame completes on id 7 and by then the clock has
//! moved on two frames; running backward it completes on id 0 as sent.

/// Bits of the hours byte that select the frame rate.
const RATE_BITS: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timecode {
    /// Most recent full frame.
    pub complete: Option<[u8; 4]>,
    /// `complete` was assembled from quarter frames.
    pub from_quarters: bool,
    /// Frame being assembled.
    pub partial: Option<[u8; 4]>,
    /// Quarter frames are running backward.
    pub reverse: bool,
    /// Id advertised as the last one applied to `partial`.
    pub point: u8,
    last_id: u8,
}

impl Timecode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds tracking state from journal fields.
    pub fn from_fields(
        complete: Option<[u8; 4]>,
        from_quarters: bool,
        partial: Option<[u8; 4]>,
        reverse: bool,
        point: u8,
    ) -> Self {
        Self {
            complete,
            from_quarters,
            partial,
            reverse,
            point: point & 7,
            last_id: point & 7,
        }
    }

    /// Applies one quarter-frame data byte. Returns true when a frame completed.
    pub fn quarter_frame(&mut self, data: u8) -> bool {
        let id = (data >> 4) & 7;
        let nibble = data & 0x0F;
        let prev = self.last_id;
        self.last_id = id;

        let (expected, start, end) = if self.reverse {
            (prev.wrapping_sub(1) & 7 == id, 7, 0)
        } else {
            ((prev + 1) & 7 == id, 0, 7)
        };

        if !expected {
            match id {
                0 | 7 => {
                    self.reverse = id == 7;
                    let mut frame = [0; 4];
                    put_nibble(&mut frame, id, nibble);
                    self.partial = Some(frame);
                    self.point = id;
                }
                _ if !self.reverse && prev.wrapping_sub(1) & 7 == id => {
                    self.reverse = true;
                    self.point = 0;
                }
                _ => {
                    self.reverse = false;
                    if self.partial.take().is_some() {
                        self.point = 7;
                    }
                }
            }
            return false;
        }

        self.point = id;
        if id == end {
            let Some(mut frame) = self.partial.take() else {
                return false;
            };
            put_nibble(&mut frame, id, nibble);
            if !self.reverse {
                advance(&mut frame, 2);
            }
            self.complete = Some(frame);
            self.from_quarters = true;
            return true;
        }

        if id == start && self.partial.is_none() {
            self.partial = Some([0; 4]);
        }
        if let Some(frame) = self.partial.as_mut() {
            put_nibble(frame, id, nibble);
        }
        false
    }

    /// Adopts what a journal says about the sender's time code.
    ///
    /// A journal without a complete frame leaves the known one in place.
    pub fn merge(&mut self, journal: &Timecode) {
        if journal.complete.is_some() {
            self.complete = journal.complete;
            self.from_quarters = journal.from_quarters;
        }
        self.partial = journal.partial;
        self.reverse = journal.reverse;
        self.point = journal.point;
        self.last_id = journal.point;
    }
}

fn put_nibble(frame: &mut [u8; 4], id: u8, nibble: u8) {
    let byte = &mut frame[usize::from(id >> 1)];
    if id & 1 == 1 {
        *byte = (*byte & 0xF0) | nibble;
    } else {
        *byte = (*byte & 0x0F) | (nibble << 4);
    }
}

#[inline]
fn field(byte: u8, high_mask: u8) -> u8 {
    (byte >> 4) + ((byte & high_mask) << 4)
}

#[inline]
fn pack(value: u8) -> u8 {
    ((value & 0x0F) << 4) | (value >> 4)
}

/// Moves a packed frame forward by `frames`.
fn advance(frame: &mut [u8; 4], frames: u8) {
    let rate_bits = frame[3] & RATE_BITS;
    let rate = match rate_bits {
        0 => 24,
        2 => 25,
        _ => 30,
    };

    let mut ff = field(frame[0], 0x01) + frames;
    let mut ss = field(frame[1], 0x03);
    let mut mm = field(frame[2], 0x03);
    let mut hh = field(frame[3], 0x01);

    if ff >= rate {
        ff -= rate;
        ss += 1;
        if ss >= 60 {
            ss = 0;
            mm += 1;
            if mm >= 60 {
                mm = 0;
                hh = (hh + 1) % 24;
            }
        }
    }

    frame[0] = pack(ff);
    frame[1] = pack(ss);
    frame[2] = pack(mm);
    frame[3] = pack(hh) | rate_bits;
}
