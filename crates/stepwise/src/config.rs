//! Playback configuration: speed multipliers and timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Delay between automatic steps at speed 1.0.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(1000);

/// Floor for the computed tick interval; tokio intervals reject a zero period.
pub const MIN_STEP_DELAY: Duration = Duration::from_millis(1);

/// Ceiling for the computed tick interval, so vanishingly small speeds still
/// yield a schedulable deadline.
pub const MAX_STEP_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// A playback speed multiplier: finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    pub fn new(multiplier: f64) -> Result<Self, PlaybackError> {
        if multiplier.is_finite() && multiplier > 0.0 {
            Ok(Self(multiplier))
        } else {
            Err(PlaybackError::InvalidSpeed { speed: multiplier })
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Tick interval for this speed over `base`.
    pub fn step_delay(self, base: Duration) -> Duration {
        step_delay(base, self)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<f64> for Speed {
    type Error = PlaybackError;

    fn try_from(multiplier: f64) -> Result<Self, Self::Error> {
        Self::new(multiplier)
    }
}

impl From<Speed> for f64 {
    fn from(speed: Speed) -> Self {
        speed.0
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// The speeds a player UI usually offers. The engine accepts any [`Speed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPreset {
    VerySlow,
    Slow,
    Normal,
    Fast,
    VeryFast,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 5] = [
        Self::VerySlow,
        Self::Slow,
        Self::Normal,
        Self::Fast,
        Self::VeryFast,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            Self::VerySlow => 0.25,
            Self::Slow => 0.5,
            Self::Normal => 1.0,
            Self::Fast => 1.5,
            Self::VeryFast => 2.0,
        }
    }
}

impl From<SpeedPreset> for Speed {
    fn from(preset: SpeedPreset) -> Self {
        Speed(preset.multiplier())
    }
}

/// `base / speed`, clamped to [`MIN_STEP_DELAY`]..=[`MAX_STEP_DELAY`].
pub fn step_delay(base: Duration, speed: Speed) -> Duration {
    let nanos = base.as_nanos() as f64 / speed.get();
    if nanos >= MAX_STEP_DELAY.as_nanos() as f64 {
        return MAX_STEP_DELAY;
    }
    Duration::from_nanos(nanos.round() as u64).max(MIN_STEP_DELAY)
}

/// Serializable playback options. Every field has a default, so a partial
/// JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    pub speed: Speed,
    /// Start playing as soon as a non-empty sequence is loaded.
    pub auto_play: bool,
    /// Restart from the first step instead of completing.
    #[serde(alias = "loop")]
    pub looping: bool,
    /// Tick interval at speed 1.0, in milliseconds.
    pub step_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: Speed::NORMAL,
            auto_play: false,
            looping: false,
            step_delay_ms: DEFAULT_STEP_DELAY.as_millis() as u64,
        }
    }
}

impl PlaybackConfig {
    pub fn from_json(json: &str) -> Result<Self, PlaybackError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.step_delay_ms == 0 {
            return Err(PlaybackError::InvalidConfig {
                reason: "stepDelayMs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn step_delay(&self) -> Duration {
        step_delay(self.base_delay(), self.speed)
    }
}
