//! Testing utilities for stepwise.
//!
//! - [`RecordingObserver`] captures every notification an engine emits, in
//!   order, behind a cloneable [`EventLog`] the test keeps.
//! - [`fixtures`] builds small traces to play.

use std::sync::Arc;

use parking_lot::Mutex;
use stepwise_core::{PlaybackEvent, PlaybackObserver, Step};

/// One recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub event: PlaybackEvent,
    /// Description of the step, for step changes.
    pub description: Option<String>,
}

/// Shared, ordered record of notifications.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Recorded>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: PlaybackEvent, description: Option<String>) {
        self.entries.lock().push(Recorded { event, description });
    }

    pub fn entries(&self) -> Vec<Recorded> {
        self.entries.lock().clone()
    }

    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.entries.lock().iter().map(|r| r.event).collect()
    }

    /// Indices reported by step changes, in order.
    pub fn step_indices(&self) -> Vec<usize> {
        self.entries
            .lock()
            .iter()
            .filter_map(|r| match r.event {
                PlaybackEvent::StepChanged { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// `(is_playing, is_paused)` pairs reported, in order.
    pub fn play_states(&self) -> Vec<(bool, bool)> {
        self.entries
            .lock()
            .iter()
            .filter_map(|r| match r.event {
                PlaybackEvent::PlayStateChanged {
                    is_playing,
                    is_paused,
                } => Some((is_playing, is_paused)),
                _ => None,
            })
            .collect()
    }

    pub fn step_changes(&self) -> usize {
        self.step_indices().len()
    }

    pub fn completions(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.event == PlaybackEvent::Completed)
            .count()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.entries.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Observer that appends every notification to an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    log: EventLog,
}

impl RecordingObserver {
    /// A fresh observer and the log it writes to.
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::new();
        (Self { log: log.clone() }, log)
    }

    /// An observer writing to an existing log.
    pub fn with_log(log: EventLog) -> Self {
        Self { log }
    }
}

impl<P> PlaybackObserver<P> for RecordingObserver {
    fn on_step_change(&mut self, step: &Step<P>, index: usize) {
        self.log.push(
            PlaybackEvent::StepChanged { index },
            Some(step.description.clone()),
        );
    }

    fn on_play_state_change(&mut self, is_playing: bool, is_paused: bool) {
        self.log.push(
            PlaybackEvent::PlayStateChanged {
                is_playing,
                is_paused,
            },
            None,
        );
    }

    fn on_complete(&mut self) {
        self.log.push(PlaybackEvent::Completed, None);
    }
}

pub mod fixtures {
    //! Ready-made traces.

    use serde_json::json;
    use stepwise_core::trace::{array_of, ElementState, Frame, Pointer, Variable};
    use stepwise_core::{StepSequence, TraceMetadata};

    /// `n` steps described `"step {i}"` carrying their own index.
    pub fn numbered(n: usize) -> StepSequence<usize> {
        StepSequence::from_payloads((0..n).map(|i| (format!("step {i}"), i)))
    }

    /// Hash-map Two Sum over `[2, 7, 11, 15]`, target 9.
    pub fn two_sum() -> StepSequence<Frame> {
        let nums = [2, 7, 11, 15];
        let with_states = |states: [ElementState; 4]| {
            array_of(nums)
                .into_iter()
                .zip(states)
                .map(|(el, state)| el.with_state(state))
                .collect::<Vec<_>>()
        };
        use ElementState::{Active, Comparing, Default as Idle, Found};

        StepSequence::from_payloads([
            (
                "Initialize empty hash map and start iteration",
                Frame::default()
                    .with_array(array_of(nums))
                    .with_pointer(Pointer::new("i", 0))
                    .with_variable(Variable::new("target", 9))
                    .with_variable(Variable::new("map", "{}")),
            ),
            (
                "Check index 0: complement = 9 - 2 = 7",
                Frame::default()
                    .with_array(with_states([Active, Idle, Idle, Idle]))
                    .with_pointer(Pointer::new("i", 0))
                    .with_variable(Variable::new("complement", 7))
                    .with_operation("Calculate complement"),
            ),
            (
                "Complement 7 not in map, store 2 -> 0",
                Frame::default()
                    .with_array(with_states([Comparing, Idle, Idle, Idle]))
                    .with_pointer(Pointer::new("i", 0))
                    .with_variable(Variable::new("map", "{2: 0}"))
                    .with_operation("Add to map"),
            ),
            (
                "Check index 1: complement = 9 - 7 = 2",
                Frame::default()
                    .with_array(with_states([Idle, Active, Idle, Idle]))
                    .with_pointer(Pointer::new("i", 1))
                    .with_variable(Variable::new("complement", 2))
                    .with_operation("Calculate complement"),
            ),
            (
                "Found! Complement 2 exists in map at index 0",
                Frame::default()
                    .with_array(with_states([Found, Found, Idle, Idle]))
                    .with_pointer(Pointer::new("i", 1))
                    .with_pointer(Pointer::new("found", 0))
                    .with_variable(Variable::new("result", json!([0, 1])))
                    .with_operation("Return indices"),
            ),
        ])
    }

    pub fn two_sum_metadata() -> TraceMetadata {
        TraceMetadata::new("two-sum", "1. Two Sum", "Hash Map", 5).with_complexity("O(n)")
    }
}
