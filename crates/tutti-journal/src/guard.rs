//! Guard packet timing.
//!
//! After the last journal change the sender keeps re-sending the journal in
//! empty "guard" packets at a growing interval, so a receiver that lost the
//! change hears about it even when the stream goes quiet.

use crate::config::{FecLevel, JournalConfig};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct GuardTimer {
    fec: FecLevel,
    base: Option<Duration>,
    ontime: Duration,
    max: Duration,
    deadline: Option<Instant>,
    next: Duration,
}

impl GuardTimer {
    pub fn new(config: &JournalConfig) -> Self {
        let base = match config.fec {
            FecLevel::None | FecLevel::NoGuard => None,
            FecLevel::Minimal => Some(config.guard_mintime),
            FecLevel::Standard | FecLevel::Extra => Some(config.guard_stdtime),
        };
        Self {
            fec: config.fec,
            base,
            ontime: config.guard_ontime,
            max: config.guard_maxtime,
            deadline: None,
            next: base.unwrap_or(config.guard_maxtime),
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.base.is_some()
    }

    /// Restarts the countdown after a journal change.
    pub fn touch(&mut self, now: Instant) {
        let Some(base) = self.base else { return };
        self.deadline = Some(now + base);
        self.next = if self.fec == FecLevel::Minimal {
            (base * 2).min(self.max)
        } else {
            base
        };
    }

    /// Restarts the countdown after a NoteOn.
    pub fn touch_note_on(&mut self, now: Instant) {
        match self.base {
            Some(base) if self.fec == FecLevel::Extra => {
                self.deadline = Some(now + self.ontime);
                self.next = base;
            }
            _ => self.touch(now),
        }
    }

    /// Asks for a guard packet at the next poll, then continues as after a change.
    pub fn request(&mut self, now: Instant) {
        if self.base.is_some() {
            self.touch(now);
            self.deadline = Some(now);
        }
    }

    /// True when a guard packet is due. Each firing doubles the following interval.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = Some(now + self.next);
                self.next = (self.next * 2).min(self.max);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(fec: FecLevel) -> GuardTimer {
        GuardTimer::new(&JournalConfig {
            fec,
            ..Default::default()
        })
    }

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_idle_timer_never_fires() {
        let mut guard = timer(FecLevel::Standard);
        assert!(!guard.poll(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn test_interval_doubles_up_to_max() {
        let mut guard = timer(FecLevel::Standard);
        let t0 = Instant::now();
        guard.touch(t0);

        assert!(!guard.poll(t0 + 99 * MS));
        assert!(guard.poll(t0 + 100 * MS));
        assert_eq!(guard.deadline(), Some(t0 + 200 * MS));
        assert!(guard.poll(t0 + 200 * MS));
        assert_eq!(guard.deadline(), Some(t0 + 400 * MS));
        assert!(guard.poll(t0 + 400 * MS));
        assert!(guard.poll(t0 + 800 * MS));
        assert!(guard.poll(t0 + 1600 * MS));
        assert_eq!(guard.deadline(), Some(t0 + 2600 * MS));
    }

    #[test]
    fn test_minimal_skips_first_doubling() {
        let mut guard = timer(FecLevel::Minimal);
        let t0 = Instant::now();
        guard.touch(t0);
        assert!(guard.poll(t0 + 250 * MS));
        assert_eq!(guard.deadline(), Some(t0 + 750 * MS));
    }

    #[test]
    fn test_extra_uses_short_guard_after_note_on() {
        let mut guard = timer(FecLevel::Extra);
        let t0 = Instant::now();
        guard.touch_note_on(t0);
        assert!(guard.poll(t0 + 20 * MS));
        assert_eq!(guard.deadline(), Some(t0 + 120 * MS));

        let mut standard = timer(FecLevel::Standard);
        standard.touch_note_on(t0);
        assert!(!standard.poll(t0 + 20 * MS));
    }

    #[test]
    fn test_request_fires_immediately() {
        let mut guard = timer(FecLevel::Standard);
        let t0 = Instant::now();
        guard.request(t0);
        assert!(guard.poll(t0));
        assert_eq!(guard.deadline(), Some(t0 + 100 * MS));
    }

    #[test]
    fn test_no_guard_levels() {
        for fec in [FecLevel::None, FecLevel::NoGuard] {
            let mut guard = timer(fec);
            let t0 = Instant::now();
            guard.touch(t0);
            assert!(!guard.enabled());
            assert!(!guard.poll(t0 + Duration::from_secs(5)));
        }
    }
}
