//! Extended sequence numbers and loss classification.

/// Epoch increment of an extended sequence number.
pub const EPOCH: u32 = 0x1_0000;
const EPOCH_MASK: u32 = 0xFFFF_0000;

/// Sequence numbers this close to the ends of the 16-bit range decide wraparound.
const WRAP_LOW: u16 = 4095;
const WRAP_HIGH: u16 = 61440;

/// What a packet's sequence number says about the packets before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossClass {
    /// Next in order; nothing was lost.
    Normal,
    /// Exactly one packet went missing.
    LostOne,
    /// Several packets went missing, or this is the first packet.
    LostMany,
    /// Duplicate or late; ignore the packet.
    Discard,
    /// Implausible jump; possibly a replay. No state was changed.
    Security,
}

impl LossClass {
    /// Whether the journal of this packet must be decoded.
    #[inline]
    pub fn needs_repair(self) -> bool {
        matches!(self, Self::LostOne | Self::LostMany)
    }

    #[inline]
    pub fn accepted(self) -> bool {
        !matches!(self, Self::Discard | Self::Security)
    }
}

/// Per-source tracking of the highest sequence number seen.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    started: bool,
    hi_lobits: u16,
    hi_ext: u32,
    base: u32,
    received: u64,
    jitter: u32,
    last_transit: Option<i64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a packet and advances the highest sequence number.
    pub fn classify(&mut self, seq: u16, max_dropout: u16) -> LossClass {
        if !self.started {
            self.started = true;
            self.hi_lobits = seq;
            self.hi_ext = u32::from(seq);
            self.base = self.hi_ext;
            self.received = 1;
            return LossClass::LostMany;
        }

        let diff = i32::from(seq) - i32::from(self.hi_lobits);
        let class = if diff.unsigned_abs() > u32::from(max_dropout) {
            if seq < WRAP_LOW && self.hi_lobits > WRAP_HIGH {
                let epoch = (self.hi_ext & EPOCH_MASK).wrapping_add(EPOCH);
                let next = epoch | u32::from(seq);
                let class = Self::by_increment(i64::from(next) - i64::from(self.hi_ext));
                self.hi_ext = next;
                self.hi_lobits = seq;
                class
            } else if self.hi_lobits < WRAP_LOW && seq > WRAP_HIGH {
                LossClass::Discard
            } else {
                return LossClass::Security;
            }
        } else {
            let class = Self::by_increment(i64::from(diff));
            if diff > 0 {
                self.hi_ext = (self.hi_ext & EPOCH_MASK) | u32::from(seq);
                self.hi_lobits = seq;
            }
            class
        };

        self.received += 1;
        class
    }

    fn by_increment(diff: i64) -> LossClass {
        match diff {
            1 => LossClass::Normal,
            2 => LossClass::LostOne,
            d if d > 2 => LossClass::LostMany,
            _ => LossClass::Discard,
        }
    }

    /// Interarrival jitter update, in timestamp units.
    pub fn update_jitter(&mut self, transit: i64) {
        if let Some(last) = self.last_transit {
            let d = (transit - last).unsigned_abs().min(u64::from(u32::MAX)) as u32;
            self.jitter = self
                .jitter
                .saturating_add(d)
                .saturating_sub(self.jitter.saturating_add(8) >> 4);
        }
        self.last_transit = Some(transit);
    }

    /// Extends a 16-bit sequence number that is at most one epoch behind the highest seen.
    pub fn extend(&self, lobits: u16) -> u32 {
        let epoch = self.hi_ext & EPOCH_MASK;
        if lobits > self.hi_lobits {
            epoch.wrapping_sub(EPOCH) | u32::from(lobits)
        } else {
            epoch | u32::from(lobits)
        }
    }

    #[inline]
    pub fn started(&self) -> bool {
        self.started
    }

    #[inline]
    pub fn hi_ext(&self) -> u32 {
        self.hi_ext
    }

    #[inline]
    pub fn hi_lobits(&self) -> u16 {
        self.hi_lobits
    }

    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub fn received(&self) -> u64 {
        self.received
    }

    #[inline]
    pub fn jitter(&self) -> u32 {
        self.jitter
    }

    /// Packets expected since the first one, per the highest sequence seen.
    pub fn expected(&self) -> u64 {
        if self.started {
            u64::from(self.hi_ext.wrapping_sub(self.base)) + 1
        } else {
            0
        }
    }
}

/// Moves a receiver-reported extended sequence number into the local epoch.
///
/// Only the low 16 bits of the report are trusted; the result is never ahead of `current`.
pub fn localize(reported: u32, current: u32) -> u32 {
    let local = (current & EPOCH_MASK) | (reported & 0xFFFF);
    if local > current {
        local.wrapping_sub(EPOCH)
    } else {
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DROPOUT: u16 = 4000;

    fn started_at(seq: u16) -> SequenceTracker {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.classify(seq, DROPOUT), LossClass::LostMany);
        tracker
    }

    #[test]
    fn test_in_order_and_gaps() {
        let mut tracker = started_at(100);
        assert_eq!(tracker.classify(101, DROPOUT), LossClass::Normal);
        assert_eq!(tracker.classify(103, DROPOUT), LossClass::LostOne);
        assert_eq!(tracker.classify(110, DROPOUT), LossClass::LostMany);
        assert_eq!(tracker.classify(110, DROPOUT), LossClass::Discard);
        assert_eq!(tracker.classify(105, DROPOUT), LossClass::Discard);
        assert_eq!(tracker.hi_ext(), 110);
        assert_eq!(tracker.received(), 6);
    }

    #[test]
    fn test_forward_wraparound() {
        let mut tracker = started_at(65534);
        assert_eq!(tracker.classify(65535, DROPOUT), LossClass::Normal);
        assert_eq!(tracker.classify(0, DROPOUT), LossClass::Normal);
        assert_eq!(tracker.hi_ext(), 0x1_0000);
        assert_eq!(tracker.classify(2, DROPOUT), LossClass::LostOne);
        assert_eq!(tracker.hi_ext(), 0x1_0002);
    }

    #[test]
    fn test_late_packet_from_previous_epoch() {
        let mut tracker = started_at(65535);
        tracker.classify(1, DROPOUT);
        assert_eq!(tracker.classify(65535, DROPOUT), LossClass::Discard);
        assert_eq!(tracker.hi_ext(), 0x1_0001);
    }

    #[test]
    fn test_security_leaves_state_alone() {
        let mut tracker = started_at(30000);
        assert_eq!(tracker.classify(40000, DROPOUT), LossClass::Security);
        assert_eq!(tracker.hi_ext(), 30000);
        assert_eq!(tracker.received(), 1);
        assert_eq!(tracker.classify(30001, DROPOUT), LossClass::Normal);
    }

    #[test]
    fn test_jitter_decays() {
        let mut tracker = SequenceTracker::new();
        tracker.update_jitter(1000);
        tracker.update_jitter(1160);
        assert_eq!(tracker.jitter(), 160);
        tracker.update_jitter(1160);
        assert_eq!(tracker.jitter(), 160 - ((160 + 8) >> 4));
    }

    #[test]
    fn test_jitter_saturates_on_wild_transit() {
        let mut tracker = SequenceTracker::new();
        let extreme = i64::from(u32::MAX);
        for i in 0..64 {
            tracker.update_jitter(if i % 2 == 0 { extreme } else { -extreme });
        }
        assert!(tracker.jitter() > u32::MAX / 2);

        for i in 0..64 {
            tracker.update_jitter(if i % 2 == 0 { extreme } else { 0 });
        }
        assert!(tracker.jitter() > u32::MAX / 2);
    }

    #[test]
    fn test_extend_checkpoint() {
        let mut tracker = started_at(65000);
        tracker.classify(100, DROPOUT);
        assert_eq!(tracker.hi_ext(), 0x1_0064);
        assert_eq!(tracker.extend(50), 0x1_0032);
        assert_eq!(tracker.extend(64990), 64990);
    }

    #[test]
    fn test_localize() {
        assert_eq!(localize(0x0003_0010, 0x0001_0020), 0x0001_0010);
        assert_eq!(localize(0x0000_FFF0, 0x0001_0020), 0x0000_FFF0);
        assert_eq!(localize(0x0001_0020, 0x0001_0020), 0x0001_0020);
    }
}
