//! Journal configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How aggressively the sender protects the stream against loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FecLevel {
    /// No recovery journal is sent.
    None,
    /// Journal on every packet, but no guard packets.
    NoGuard,
    /// Guard packets at the long interval; the first doubling is skipped.
    Minimal,
    #[default]
    Standard,
    /// Standard, plus a short guard after every NoteOn.
    Extra,
}

/// Configuration for the recovery journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub fec: FecLevel,
    /// Maintain chapter E (note reference counts and release velocities).
    pub note_extras: bool,
    /// Receiver state slots before the oldest source is evicted.
    pub max_sources: usize,
    pub guard_ontime: Duration,
    pub guard_mintime: Duration,
    pub guard_stdtime: Duration,
    pub guard_maxtime: Duration,
    /// How long the "play now" hint of a NoteOn log stays set.
    pub note_on_expiry: Duration,
    /// A sounding note older than this is considered dated during repair.
    pub note_dated_after: Duration,
    /// Largest sequence jump that is still treated as loss.
    pub max_dropout: u16,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            fec: FecLevel::Standard,
            note_extras: false,
            max_sources: 16,
            guard_ontime: Duration::from_millis(20),
            guard_mintime: Duration::from_millis(250),
            guard_stdtime: Duration::from_millis(100),
            guard_maxtime: Duration::from_secs(1),
            note_on_expiry: Duration::from_millis(20),
            note_dated_after: Duration::from_millis(100),
            max_dropout: 4000,
        }
    }
}

impl JournalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_sources == 0 {
            return Err(Error::InvalidConfig(
                "max_sources must be at least 1".to_string(),
            ));
        }
        for (name, interval) in [
            ("guard_ontime", self.guard_ontime),
            ("guard_mintime", self.guard_mintime),
            ("guard_stdtime", self.guard_stdtime),
        ] {
            if interval.is_zero() || interval > self.guard_maxtime {
                return Err(Error::InvalidConfig(format!(
                    "{name} {interval:?} out of range (0-{:?})",
                    self.guard_maxtime
                )));
            }
        }
        if self.max_dropout == 0 || self.max_dropout >= 0x8000 {
            return Err(Error::InvalidConfig(format!(
                "max_dropout {} out of range (1-32767)",
                self.max_dropout
            )));
        }
        Ok(())
    }

    /// Whether outgoing packets carry a journal at all.
    #[inline]
    pub fn journaling(&self) -> bool {
        self.fec != FecLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = JournalConfig::default();
        assert_eq!(config.fec, FecLevel::Standard);
        assert_eq!(config.max_sources, 16);
        assert!(config.journaling());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_guard_intervals() {
        let config = JournalConfig {
            guard_mintime: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_sources() {
        let config = JournalConfig {
            max_sources: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: JournalConfig =
            serde_json::from_str(r#"{ "fec": "Extra", "note_extras": true }"#).unwrap();
        assert_eq!(config.fec, FecLevel::Extra);
        assert!(config.note_extras);
        assert_eq!(config.max_dropout, 4000);
    }
}
