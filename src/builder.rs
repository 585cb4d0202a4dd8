//! Builder for configuring and constructing a `RtpMidiSession`.

use crate::{Result, RtpMidiSession, SessionConfig};
use std::time::Duration;
use tutti_journal::{FecLevel, JournalConfig};

/// Unset options keep the [`JournalConfig`] defaults. The configuration is
/// validated in [`build`](Self::build).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tutti_rtpmidi::{FecLevel, RtpMidiSession};
///
/// let session = RtpMidiSession::builder()
///     .fec(FecLevel::Extra)
///     .max_sources(4)
///     .note_dated_after(Duration::from_millis(250))
///     .build()?;
/// assert_eq!(session.config().journal.max_sources, 4);
/// # Ok::<(), tutti_rtpmidi::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Starts from a complete configuration, e.g. one loaded from a file.
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn journal(mut self, journal: JournalConfig) -> Self {
        self.config.journal = journal;
        self
    }

    /// Default: `FecLevel::Standard`
    pub fn fec(mut self, fec: FecLevel) -> Self {
        self.config.journal.fec = fec;
        self
    }

    /// Maintain note reference counts and release velocities. Default: off
    pub fn note_extras(mut self, enabled: bool) -> Self {
        self.config.journal.note_extras = enabled;
        self
    }

    /// Default: 16
    pub fn max_sources(mut self, count: usize) -> Self {
        self.config.journal.max_sources = count;
        self
    }

    /// Guard packet intervals: after a NoteOn, the minimum, the standard
    /// and the ceiling the doubling stops at.
    pub fn guard_times(
        mut self,
        ontime: Duration,
        mintime: Duration,
        stdtime: Duration,
        maxtime: Duration,
    ) -> Self {
        let journal = &mut self.config.journal;
        journal.guard_ontime = ontime;
        journal.guard_mintime = mintime;
        journal.guard_stdtime = stdtime;
        journal.guard_maxtime = maxtime;
        self
    }

    pub fn note_on_expiry(mut self, expiry: Duration) -> Self {
        self.config.journal.note_on_expiry = expiry;
        self
    }

    pub fn note_dated_after(mut self, after: Duration) -> Self {
        self.config.journal.note_dated_after = after;
        self
    }

    /// Default: 4000
    pub fn max_dropout(mut self, packets: u16) -> Self {
        self.config.journal.max_dropout = packets;
        self
    }

    /// RTP timestamp rate in Hz. Default: 44100
    pub fn clock_rate(mut self, hz: u32) -> Self {
        self.config.clock_rate = hz;
        self
    }

    pub fn build(self) -> Result<RtpMidiSession> {
        self.config.validate()?;
        Ok(RtpMidiSession::from_config(self.config))
    }
}
