//! Per-source receiver records.

use crate::receiver::ReceiverState;
use crate::seq::{LossClass, SequenceTracker};
use std::time::Instant;
use tracing::debug;

/// Handle to a record in a [`SourcePool`].
///
/// The generation makes a handle to a removed or evicted source fail lookups
/// instead of reaching whoever reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId {
    index: u32,
    generation: u32,
}

/// A remote participant whose stream this session receives.
#[derive(Debug)]
pub struct Source {
    ssrc: u32,
    birth: Instant,
    pub seq: SequenceTracker,
    /// Highest extended sequence number of our stream this participant has acknowledged.
    pub last_hiseq_ext: Option<u32>,
    /// Whether the participant's packets arrive early enough to replay NoteOns.
    pub on_time: bool,
    pub receiver: ReceiverState,
}

impl Source {
    fn new(ssrc: u32, birth: Instant) -> Self {
        Self {
            ssrc,
            birth,
            seq: SequenceTracker::new(),
            last_hiseq_ext: None,
            on_time: true,
            receiver: ReceiverState::new(),
        }
    }

    #[inline]
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    #[inline]
    pub fn birth(&self) -> Instant {
        self.birth
    }

    /// Classifies an arriving packet against this source's sequence history.
    #[inline]
    pub fn classify(&mut self, seq: u16, max_dropout: u16) -> LossClass {
        self.seq.classify(seq, max_dropout)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    source: Option<Source>,
}

/// Fixed-capacity slot map of sources.
///
/// When full, inserting a new participant evicts the one with the oldest birth time.
#[derive(Debug)]
pub struct SourcePool {
    slots: Vec<Slot>,
    capacity: usize,
}

impl SourcePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns the record for `ssrc`, creating it if needed.
    pub fn insert(&mut self, ssrc: u32, now: Instant) -> SourceId {
        if let Some(id) = self.find_ssrc(ssrc) {
            return id;
        }

        let index = match self.slots.iter().position(|slot| slot.source.is_none()) {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    source: None,
                });
                self.slots.len() - 1
            }
            None => {
                let index = self.oldest().unwrap_or(0);
                if let Some(evicted) = self.slots[index].source.take() {
                    debug!(ssrc = evicted.ssrc, "Evicting oldest source");
                }
                self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
                index
            }
        };

        self.slots[index].source = Some(Source::new(ssrc, now));
        debug!(ssrc, slot = index, "Source added");
        SourceId {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    fn oldest(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.source.as_ref().map(|s| (i, s.birth)))
            .min_by_key(|&(_, birth)| birth)
            .map(|(i, _)| i)
    }

    fn slot(&self, id: SourceId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.slot(id).and_then(|slot| slot.source.as_ref())
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.source.as_mut())
    }

    pub fn find_ssrc(&self, ssrc: u32) -> Option<SourceId> {
        self.iter()
            .find(|(_, source)| source.ssrc == ssrc)
            .map(|(id, _)| id)
    }

    /// Tears down a source. Its id, and any copy of it, stops resolving.
    pub fn remove(&mut self, id: SourceId) -> Option<Source> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let source = slot.source.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        debug!(ssrc = source.ssrc, "Source removed");
        Some(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &Source)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.source.as_ref().map(|source| {
                (
                    SourceId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    source,
                )
            })
        })
    }

    /// Acknowledgments reported by every source that has sent one.
    pub fn acknowledged(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().filter_map(|(_, source)| source.last_hiseq_ext)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_insert_is_idempotent_per_ssrc() {
        let mut pool = SourcePool::new(4);
        let now = Instant::now();
        let a = pool.insert(0xAAAA, now);
        assert_eq!(pool.insert(0xAAAA, now), a);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(a).map(Source::ssrc), Some(0xAAAA));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut pool = SourcePool::new(2);
        let t0 = Instant::now();
        let first = pool.insert(1, t0);
        let second = pool.insert(2, t0 + Duration::from_millis(5));
        let third = pool.insert(3, t0 + Duration::from_millis(10));

        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
        assert_eq!(pool.get(third).map(Source::ssrc), Some(3));
        assert_eq!(pool.find_ssrc(1), None);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_stale_id_does_not_alias_reused_slot() {
        let mut pool = SourcePool::new(1);
        let now = Instant::now();
        let old = pool.insert(7, now);
        assert!(pool.remove(old).is_some());
        let new = pool.insert(8, now);

        assert_ne!(old, new);
        assert!(pool.get(old).is_none());
        assert!(pool.remove(old).is_none());
        assert_eq!(pool.get(new).map(Source::ssrc), Some(8));
    }

    #[test]
    fn test_acknowledged_skips_silent_sources() {
        let mut pool = SourcePool::new(4);
        let now = Instant::now();
        let a = pool.insert(1, now);
        pool.insert(2, now);
        if let Some(source) = pool.get_mut(a) {
            source.last_hiseq_ext = Some(42);
        }
        assert_eq!(pool.acknowledged().collect::<Vec<_>>(), vec![42]);
    }
}
