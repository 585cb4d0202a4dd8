//! Song position and transport state shared by chapter Q on both ends.

use tutti_midi::CommandKind;

/// Clock counts are 19 bits on the wire.
pub const CLOCK_MASK: u32 = 0x7_FFFF;

/// Clocks per MIDI beat.
pub const CLOCKS_PER_BEAT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequencer {
    pub running: bool,
    /// A clock arrived since the last counted downbeat.
    pub downbeat: bool,
    /// Clocks since the start of the song, when known.
    pub clock: Option<u32>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a transport command.
    ///
    /// Returns false when the command cannot change the state: anything that
    /// is not a transport command, clocks and stops while stopped, or a
    /// continue while running.
    pub fn apply(&mut self, kind: &CommandKind<'_>) -> bool {
        match *kind {
            CommandKind::Clock if self.running => {
                if self.downbeat {
                    self.bump();
                } else {
                    self.downbeat = true;
                }
            }
            CommandKind::Start => {
                *self = Self {
                    running: true,
                    ..Self::default()
                };
            }
            CommandKind::Continue if !self.running => {
                self.running = true;
                self.clock.get_or_insert(0);
                if self.downbeat {
                    self.bump();
                    self.downbeat = false;
                }
            }
            CommandKind::Stop if self.running => self.running = false,
            CommandKind::SongPosition(beats) => {
                let clocks = CLOCKS_PER_BEAT * u32::from(beats);
                self.clock = (clocks != 0).then_some(clocks);
                self.downbeat = false;
            }
            _ => return false,
        }
        true
    }

    fn bump(&mut self) {
        let clock = self.clock.get_or_insert(0);
        *clock = (*clock + 1) & CLOCK_MASK;
    }
}
