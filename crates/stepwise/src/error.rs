//! Error types.
//!
//! Boundary conditions (stepping past either end, seeking outside the
//! sequence) are not errors: navigation returns `bool`. The variants here
//! cover caller bugs that should fail loudly: malformed input at construction,
//! out-of-range lookups at the data layer, and use after destroy.

use thiserror::Error;

/// Errors produced by the playback engine and its data types.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaybackError {
    /// A direct lookup into a step sequence missed.
    #[error("step index {index} is out of range for a sequence of {len} steps")]
    IndexOutOfRange { index: usize, len: usize },

    /// Speed multipliers must be finite and strictly positive.
    #[error("invalid playback speed {speed}: must be finite and greater than zero")]
    InvalidSpeed { speed: f64 },

    /// A step's `step_number` does not match its position in the sequence.
    #[error("malformed sequence: step at position {position} has step number {step_number}")]
    MalformedSequence { position: usize, step_number: usize },

    #[error("invalid playback configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A seeded trace or configuration document could not be parsed.
    #[error("failed to parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// The engine was built outside of a tokio runtime and no handle was given.
    #[error("no tokio runtime available to drive the playback timer")]
    NoRuntime,

    /// The engine has been destroyed and no longer accepts this operation.
    #[error("playback engine has been destroyed")]
    Destroyed,
}
