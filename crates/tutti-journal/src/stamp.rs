//! Sequence stamps and keyed log lists.
//!
//! Every journal item remembers the extended sequence number of the packet
//! that last changed it, which decides when a checkpoint can drop it, and
//! whether it changed since the last encode, which becomes its S bit.

use crate::wire::S;

/// A change to the journal: the packet it rides in, and whether it is news
/// to receivers that only lost that packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    pub seq: u32,
    pub fresh: bool,
}

impl Touch {
    pub fn fresh(seq: u32) -> Self {
        Self { seq, fresh: true }
    }

    pub fn stale(seq: u32) -> Self {
        Self { seq, fresh: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub seq: u32,
    pub stale: bool,
}

impl Stamp {
    pub fn new(touch: Touch) -> Self {
        Self {
            seq: touch.seq,
            stale: !touch.fresh,
        }
    }

    /// Restamps the item. A stale touch never hides an unsent change.
    #[inline]
    pub fn touch(&mut self, touch: Touch) {
        self.seq = touch.seq;
        if touch.fresh {
            self.stale = false;
        }
    }

    #[inline]
    pub fn s_bit(&self) -> u8 {
        if self.stale {
            S
        } else {
            0
        }
    }

    /// Covered by a checkpoint at `checkpoint`.
    #[inline]
    pub fn expired(&self, checkpoint: u32) -> bool {
        self.seq <= checkpoint
    }
}

/// Stamps `slot`, creating it if needed.
pub fn touch(slot: &mut Option<Stamp>, touch: Touch) {
    match slot {
        Some(stamp) => stamp.touch(touch),
        None => *slot = Some(Stamp::new(touch)),
    }
}

/// A chapter or field holding a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logged<T> {
    pub value: T,
    pub stamp: Stamp,
}

impl<T> Logged<T> {
    /// Stores `value` in `slot`, keeping the slot's staleness rules.
    pub fn set(slot: &mut Option<Self>, value: T, touch: Touch) {
        match slot {
            Some(logged) => {
                logged.value = value;
                logged.stamp.touch(touch);
            }
            None => {
                *slot = Some(Self {
                    value,
                    stamp: Stamp::new(touch),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub key: u8,
    pub value: T,
    pub stamp: Stamp,
}

/// A chapter made of logs keyed by a 7-bit number, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed<T> {
    pub stamp: Stamp,
    pub logs: Vec<Entry<T>>,
}

impl<T> Keyed<T> {
    pub fn new(touch: Touch) -> Self {
        Self {
            stamp: Stamp::new(touch),
            logs: Vec::new(),
        }
    }

    #[inline]
    pub fn position(&self, key: u8) -> Option<usize> {
        self.logs.iter().position(|entry| entry.key == key)
    }

    pub fn get(&self, key: u8) -> Option<&Entry<T>> {
        self.logs.iter().find(|entry| entry.key == key)
    }

    pub fn remove(&mut self, key: u8) -> Option<Entry<T>> {
        self.position(key).map(|i| self.logs.remove(i))
    }

    /// Writes the log for `key`, moving it to the end of the list.
    pub fn upsert(&mut self, key: u8, value: T, touch: Touch) {
        self.stamp.touch(touch);
        let stamp = match self.remove(key) {
            Some(mut old) => {
                old.stamp.touch(touch);
                old.stamp
            }
            None => Stamp::new(touch),
        };
        self.logs.push(Entry { key, value, stamp });
    }

    /// Drops logs covered by the checkpoint.
    pub fn trim(&mut self, checkpoint: u32) {
        self.logs.retain(|entry| !entry.stamp.expired(checkpoint));
    }

    pub fn mark_stale(&mut self) {
        self.stamp.stale = true;
        for entry in &mut self.logs {
            entry.stamp.stale = true;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_touch_keeps_dirty_item_dirty() {
        let mut stamp = Stamp::new(Touch::fresh(5));
        stamp.touch(Touch::stale(6));
        assert_eq!(stamp, Stamp { seq: 6, stale: false });

        let mut stamp = Stamp::new(Touch::stale(5));
        assert_eq!(stamp.s_bit(), S);
        stamp.touch(Touch::fresh(7));
        assert_eq!(stamp.s_bit(), 0);
    }

    #[test]
    fn test_upsert_moves_to_end() {
        let mut list = Keyed::new(Touch::fresh(1));
        list.upsert(7, 'a', Touch::fresh(1));
        list.upsert(10, 'b', Touch::fresh(2));
        list.upsert(7, 'c', Touch::fresh(3));

        let keys: Vec<_> = list.logs.iter().map(|e| (e.key, e.value)).collect();
        assert_eq!(keys, vec![(10, 'b'), (7, 'c')]);
        assert_eq!(list.stamp.seq, 3);
    }

    #[test]
    fn test_trim_by_checkpoint() {
        let mut list = Keyed::new(Touch::fresh(1));
        list.upsert(1, (), Touch::fresh(1));
        list.upsert(2, (), Touch::fresh(4));
        list.trim(3);
        assert_eq!(list.len(), 1);
        assert!(list.get(2).is_some());
    }
}
