//! # Stepwise
//!
//! A playback engine for precomputed algorithm traces: forward and backward
//! navigation, timed auto-play at variable speed, looping, and clean
//! cancellation, with every transition reported to an observer.
//!
//! ## Core Concepts
//!
//! - [`Step`] / [`StepSequence`] = the trace (immutable snapshots, indexed from 0)
//! - [`PlaybackEngine`] = one session over a trace (position, run state, timer)
//! - [`PlaybackObserver`] = who hears about it (step changed, play state changed, completed)
//! - [`PlaybackStore`] = the binding that owns at most one engine per visualization slot
//!
//! The key principle: **at most one outstanding timer per session**. Every
//! operation that changes speed or run state cancels the current timer
//! before scheduling a new one.
//!
//! ## Architecture
//!
//! ```text
//! Caller (UI / CLI / test)
//!     │
//!     ▼ load(steps, metadata)
//! PlaybackStore ──────────── watch::Sender<StoreSnapshot> ──► subscribers
//!     │ owns                          ▲
//!     ▼                               │ Mirror (PlaybackObserver)
//! PlaybackEngine                      │
//!     │                               │
//!     ├─► Playback (pure machine) ─► outbox ─┬─► Notification ──┘
//!     │                                      │
//!     │                                      └─► TimerDirective
//!     │                                              │
//!     └─◄── tick(generation) ◄── ticker task ◄───────┘ (tokio interval)
//! ```
//!
//! ## Run States
//!
//! | From | Operation | To |
//! |---|---|---|
//! | Idle / Paused / Complete | `play()` | Playing (restarts at 0 from the last step) |
//! | Playing | `pause()` | Paused |
//! | any | `reset()` | Idle at step 0 |
//! | Playing | tick at last step | Complete, or step 0 and still Playing when looping |
//!
//! ## Key Invariants
//!
//! 1. **Steps are immutable** - Sequences are built whole and replaced whole
//! 2. **Boundaries are not errors** - Navigation past either end returns `false`
//! 3. **One timer** - Cancel before reschedule, always
//! 4. **No stale ticks** - A tick from a cancelled timer never changes state
//! 5. **Destroy is final** - It cancels the timer and releases the observer
//!
//! ## Example
//!
//! ```ignore
//! use stepwise_core::{steps, Callbacks, PlaybackEngine, SpeedPreset};
//!
//! let trace = steps![
//!     "i = 0, nums[i] = 2" => 2,
//!     "i = 1, nums[i] = 7" => 7,
//!     "complement found" => 9,
//! ];
//!
//! let engine = PlaybackEngine::builder(trace)
//!     .speed(SpeedPreset::Fast)
//!     .observer(Callbacks::new().on_step_change(|step, index| {
//!         println!("{index}: {}", step.description);
//!     }))
//!     .build()?;
//!
//! engine.play();
//! ```
//!
//! ## What This Is Not
//!
//! Stepwise does not generate traces, persist them, or render them. Traces
//! are authored ahead of time; rendering belongs to whatever observes the
//! engine.

// Core modules
mod engine;
mod error;
mod machine;
mod observer;
mod state;
mod step;
mod steps_macro;
mod store;

pub mod config;
pub mod trace;

// Re-export step types
pub use step::{Step, StepSequence};

// Re-export configuration types
pub use config::{PlaybackConfig, Speed, SpeedPreset, DEFAULT_STEP_DELAY};

// Re-export error types
pub use error::PlaybackError;

// Re-export run state
pub use state::RunState;

// Re-export observer types
pub use observer::{Callbacks, PlaybackEvent, PlaybackObserver, TracingObserver};

// Re-export engine types (primary entry point)
pub use engine::{EngineBuilder, PlaybackEngine, SessionId};

// Re-export store types
pub use store::{PlaybackStore, StoreSnapshot};

// Re-export trace payload types
pub use trace::{Frame, TraceMetadata};

pub use machine::progress;
