//! The observer contract.
//!
//! A session reports three things: the current step changed, the
//! play/pause flags changed, and a non-looping run reached the end. Exactly
//! one observer is attached per session, at construction. Anything that wants
//! these notifications (a UI binding, a test recorder, a logger) implements
//! [`PlaybackObserver`], or supplies closures through [`Callbacks`].

use std::fmt;

use tracing::{debug, info};

use crate::step::{Step, StepSequence};

/// Receiver for playback notifications.
///
/// Every method defaults to a no-op. Callbacks run on whichever task
/// performed the transition (a control call or the timer task) after the
/// engine's internal lock is released, so calling back into the engine from
/// here is allowed; notifications produced that way are delivered after the
/// current callback returns.
pub trait PlaybackObserver<P>: Send {
    /// The position moved (or was re-asserted by a reset or seek).
    fn on_step_change(&mut self, _step: &Step<P>, _index: usize) {}

    /// The `(is_playing, is_paused)` pair changed.
    fn on_play_state_change(&mut self, _is_playing: bool, _is_paused: bool) {}

    /// A non-looping run reached the last step.
    fn on_complete(&mut self) {}
}

impl<P> PlaybackObserver<P> for () {}

impl<P, O> PlaybackObserver<P> for Box<O>
where
    O: PlaybackObserver<P> + ?Sized,
{
    fn on_step_change(&mut self, step: &Step<P>, index: usize) {
        (**self).on_step_change(step, index)
    }

    fn on_play_state_change(&mut self, is_playing: bool, is_paused: bool) {
        (**self).on_play_state_change(is_playing, is_paused)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }
}

type StepFn<P> = Box<dyn FnMut(&Step<P>, usize) + Send>;
type PlayStateFn = Box<dyn FnMut(bool, bool) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// Three optional closure slots, one per notification channel.
pub struct Callbacks<P> {
    step_change: Option<StepFn<P>>,
    play_state_change: Option<PlayStateFn>,
    complete: Option<CompleteFn>,
}

impl<P> Callbacks<P> {
    pub fn new() -> Self {
        Self {
            step_change: None,
            play_state_change: None,
            complete: None,
        }
    }

    pub fn on_step_change(mut self, f: impl FnMut(&Step<P>, usize) + Send + 'static) -> Self {
        self.step_change = Some(Box::new(f));
        self
    }

    pub fn on_play_state_change(mut self, f: impl FnMut(bool, bool) + Send + 'static) -> Self {
        self.play_state_change = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl<P> Default for Callbacks<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Callbacks<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("step_change", &self.step_change.is_some())
            .field("play_state_change", &self.play_state_change.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

impl<P> PlaybackObserver<P> for Callbacks<P> {
    fn on_step_change(&mut self, step: &Step<P>, index: usize) {
        if let Some(f) = self.step_change.as_mut() {
            f(step, index);
        }
    }

    fn on_play_state_change(&mut self, is_playing: bool, is_paused: bool) {
        if let Some(f) = self.play_state_change.as_mut() {
            f(is_playing, is_paused);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.complete.as_mut() {
            f();
        }
    }
}

/// Logs every notification through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    label: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("playback")
    }
}

impl<P> PlaybackObserver<P> for TracingObserver {
    fn on_step_change(&mut self, step: &Step<P>, index: usize) {
        info!(target: "stepwise::observer", label = self.label(), index, description = %step.description, "step changed");
    }

    fn on_play_state_change(&mut self, is_playing: bool, is_paused: bool) {
        debug!(target: "stepwise::observer", label = self.label(), is_playing, is_paused, "play state changed");
    }

    fn on_complete(&mut self) {
        info!(target: "stepwise::observer", label = self.label(), "playback complete");
    }
}

/// Payload-free description of a notification, for logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackEvent {
    StepChanged { index: usize },
    PlayStateChanged { is_playing: bool, is_paused: bool },
    Completed,
}

/// A queued notification, carrying the sequence the step index refers to.
pub(crate) enum Notification<P> {
    StepChanged {
        sequence: StepSequence<P>,
        index: usize,
    },
    PlayStateChanged {
        is_playing: bool,
        is_paused: bool,
    },
    Completed,
}

impl<P> Notification<P> {
    pub(crate) fn event(&self) -> PlaybackEvent {
        match *self {
            Self::StepChanged { index, .. } => PlaybackEvent::StepChanged { index },
            Self::PlayStateChanged {
                is_playing,
                is_paused,
            } => PlaybackEvent::PlayStateChanged {
                is_playing,
                is_paused,
            },
            Self::Completed => PlaybackEvent::Completed,
        }
    }

    pub(crate) fn deliver(self, observer: &mut dyn PlaybackObserver<P>) {
        match self {
            Self::StepChanged { sequence, index } => {
                if let Some(step) = sequence.get(index) {
                    observer.on_step_change(step, index);
                }
            }
            Self::PlayStateChanged {
                is_playing,
                is_paused,
            } => observer.on_play_state_change(is_playing, is_paused),
            Self::Completed => observer.on_complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callbacks_route_each_channel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        let mut callbacks = Callbacks::<()>::new()
            .on_step_change(move |step, index| {
                a.lock().unwrap().push(format!("step {index} {}", step.description))
            })
            .on_play_state_change(move |playing, paused| {
                b.lock().unwrap().push(format!("state {playing} {paused}"))
            })
            .on_complete(move || c.lock().unwrap().push("done".to_string()));

        let sequence = StepSequence::from_payloads([("first", ()), ("second", ())]);
        Notification::StepChanged {
            sequence: sequence.clone(),
            index: 1,
        }
        .deliver(&mut callbacks);
        Notification::<()>::PlayStateChanged {
            is_playing: true,
            is_paused: false,
        }
        .deliver(&mut callbacks);
        Notification::<()>::Completed.deliver(&mut callbacks);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["step 1 second", "state true false", "done"]
        );
    }

    #[test]
    fn empty_slots_are_skipped() {
        let mut callbacks = Callbacks::<()>::new();
        Notification::<()>::Completed.deliver(&mut callbacks);
        assert!(format!("{callbacks:?}").contains("complete: false"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tracing_observer_logs_every_channel() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut observer = TracingObserver::labelled("two-sum");
            let sequence = StepSequence::from_payloads([("start", ()), ("found it", ())]);
            Notification::StepChanged { sequence, index: 1 }.deliver(&mut observer);
            Notification::<()>::PlayStateChanged {
                is_playing: true,
                is_paused: false,
            }
            .deliver(&mut observer);
            Notification::<()>::Completed.deliver(&mut TracingObserver::new());
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("step changed"));
        assert!(output.contains("found it"));
        assert!(output.contains("two-sum"));
        assert!(output.contains("play state changed"));
        assert!(output.contains("is_playing=true"));
        assert!(output.contains("playback complete"));
    }

    #[test]
    fn events_drop_the_payload() {
        let n = Notification::StepChanged {
            sequence: StepSequence::from_payloads([("only", ())]),
            index: 0,
        };
        assert_eq!(n.event(), PlaybackEvent::StepChanged { index: 0 });
    }
}
