//! Session configuration.

use crate::Result;
use tutti_journal::{Error as JournalError, JournalConfig};

/// Everything a [`RtpMidiSession`](crate::RtpMidiSession) is built from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    pub journal: JournalConfig,
    /// RTP timestamp rate of both directions, in Hz.
    pub clock_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            journal: JournalConfig::default(),
            clock_rate: 44_100,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.journal.validate()?;
        if self.clock_rate == 0 {
            return Err(
                JournalError::InvalidConfig("clock_rate must be at least 1 Hz".to_string()).into(),
            );
        }
        Ok(())
    }
}
