use serde::{Deserialize, Serialize};

/// Run state of a playback session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not started, or reset. Position is 0 (or undefined when empty).
    #[default]
    Idle,
    /// Timer armed, position advancing.
    Playing,
    /// Timer cancelled, position frozen, resumable.
    Paused,
    /// Reached the last step without looping.
    Complete,
}

impl RunState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Complete => "complete",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The `(is_playing, is_paused)` pair reported to observers.
    ///
    /// Idle and Complete both report `(false, false)`.
    #[inline]
    pub fn flags(&self) -> (bool, bool) {
        (self.is_playing(), self.is_paused())
    }

    #[inline]
    pub fn can_play(&self) -> bool {
        !self.is_playing()
    }

    #[inline]
    pub fn can_pause(&self) -> bool {
        self.is_playing()
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
