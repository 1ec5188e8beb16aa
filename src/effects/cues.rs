//! Sound cues
//!
//! The companion view names short cues ("eat", "click", ...) and hands them
//! to a `CuePlayer` the host supplies. The default player is silent.

use std::collections::HashSet;

use tracing::debug;

pub const DEFAULT_VOLUME: f32 = 0.8;

/// Plays one named cue
pub trait CuePlayer {
    fn play(&mut self, name: &str, volume: f32);
}

/// Player that drops every cue
#[derive(Debug, Default)]
pub struct SilentPlayer;

impl CuePlayer for SilentPlayer {
    fn play(&mut self, _name: &str, _volume: f32) {}
}

/// Known cue names plus an enable switch in front of a player
pub struct SoundCues {
    enabled: bool,
    known: HashSet<String>,
    player: Box<dyn CuePlayer>,
}

impl SoundCues {
    pub fn new(player: Box<dyn CuePlayer>) -> Self {
        Self {
            enabled: true,
            known: HashSet::new(),
            player,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentPlayer))
    }

    /// Make a cue playable
    pub fn register(&mut self, name: impl Into<String>) {
        self.known.insert(name.into());
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Play a registered cue. Returns false if disabled or unknown.
    pub fn play(&mut self, name: &str, volume: f32) -> bool {
        if !self.enabled || !self.known.contains(name) {
            return false;
        }
        debug!(cue = name, "playing cue");
        self.player.play(name, volume);
        true
    }
}
