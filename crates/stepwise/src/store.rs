//! The playback store: one visualization slot's binding to a live engine.
//!
//! A [`PlaybackStore`] exclusively owns at most one [`PlaybackEngine`].
//! It mirrors every engine notification into a [`StoreSnapshot`] published
//! on a `tokio::sync::watch` channel, so any number of readers can follow
//! the current step without touching the engine.
//!
//! Loading a new trace destroys the previous engine before the replacement
//! is built, so two timers never coexist for the same slot.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{PlaybackConfig, Speed};
use crate::engine::{PlaybackEngine, SessionId};
use crate::error::PlaybackError;
use crate::machine::progress;
use crate::observer::PlaybackObserver;
use crate::step::{Step, StepSequence};
use crate::trace::TraceMetadata;

/// Observable state of a store.
#[derive(Debug)]
pub struct StoreSnapshot<P> {
    /// Session currently bound, if any.
    pub session: Option<SessionId>,
    pub steps: StepSequence<P>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_paused: bool,
    /// Set on the last step and when a run completes.
    pub is_complete: bool,
    pub speed: Speed,
    pub looping: bool,
    pub progress: f64,
    pub metadata: Option<TraceMetadata>,
}

impl<P> StoreSnapshot<P> {
    fn empty(config: &PlaybackConfig) -> Self {
        Self {
            session: None,
            steps: StepSequence::empty(),
            current_index: None,
            is_playing: false,
            is_paused: false,
            is_complete: false,
            speed: config.speed,
            looping: config.looping,
            progress: 0.0,
            metadata: None,
        }
    }

    fn loaded(
        config: &PlaybackConfig,
        session: SessionId,
        steps: StepSequence<P>,
        metadata: Option<TraceMetadata>,
    ) -> Self {
        let current_index = (!steps.is_empty()).then_some(0);
        Self {
            session: Some(session),
            steps,
            current_index,
            metadata,
            ..Self::empty(config)
        }
    }

    pub fn current_step(&self) -> Option<&Step<P>> {
        self.current_index.and_then(|index| self.steps.get(index))
    }

    pub fn total_steps(&self) -> usize {
        self.steps.length()
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }
}

impl<P> Clone for StoreSnapshot<P> {
    fn clone(&self) -> Self {
        Self {
            session: self.session,
            steps: self.steps.clone(),
            current_index: self.current_index,
            is_playing: self.is_playing,
            is_paused: self.is_paused,
            is_complete: self.is_complete,
            speed: self.speed,
            looping: self.looping,
            progress: self.progress,
            metadata: self.metadata.clone(),
        }
    }
}

/// Copies engine notifications into the store's snapshot.
struct Mirror<P> {
    session: SessionId,
    state: Arc<watch::Sender<StoreSnapshot<P>>>,
}

impl<P> Mirror<P> {
    fn update(&self, f: impl FnOnce(&mut StoreSnapshot<P>)) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.session != Some(self.session) {
                return false;
            }
            f(snapshot);
            true
        });
    }
}

impl<P: Send + Sync> PlaybackObserver<P> for Mirror<P> {
    fn on_step_change(&mut self, _step: &Step<P>, index: usize) {
        self.update(|s| {
            let len = s.steps.length();
            s.current_index = Some(index);
            s.progress = progress(index, len);
            s.is_complete = index + 1 >= len;
        });
    }

    fn on_play_state_change(&mut self, is_playing: bool, is_paused: bool) {
        self.update(|s| {
            s.is_playing = is_playing;
            s.is_paused = is_paused;
        });
    }

    fn on_complete(&mut self) {
        self.update(|s| {
            s.is_complete = true;
            s.is_playing = false;
        });
    }
}

/// Owner of one visualization slot's playback session.
pub struct PlaybackStore<P: Send + Sync + 'static> {
    engine: Option<PlaybackEngine<P>>,
    state: Arc<watch::Sender<StoreSnapshot<P>>>,
    config: PlaybackConfig,
    runtime: Option<Handle>,
}

impl<P> PlaybackStore<P>
where
    P: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    /// Options applied to every engine this store builds.
    pub fn with_config(config: PlaybackConfig) -> Self {
        let (state, _) = watch::channel(StoreSnapshot::empty(&config));
        Self {
            engine: None,
            state: Arc::new(state),
            config,
            runtime: None,
        }
    }

    /// Host engine timers on `runtime` instead of the current runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Bind a new trace. Any existing engine is destroyed first.
    pub fn load(
        &mut self,
        steps: StepSequence<P>,
        metadata: Option<TraceMetadata>,
    ) -> Result<(), PlaybackError> {
        if let Some(previous) = self.engine.take() {
            debug!(session = %previous.session_id(), "replacing playback session");
            previous.destroy();
        }

        let session = SessionId::new();
        // Published before the build so auto-play notifications land on it.
        self.state.send_replace(StoreSnapshot::loaded(
            &self.config,
            session,
            steps.clone(),
            metadata,
        ));

        let mut builder = PlaybackEngine::builder(steps)
            .config(self.config.clone())
            .session(session)
            .observer(Mirror {
                session,
                state: Arc::clone(&self.state),
            });
        if let Some(runtime) = &self.runtime {
            builder = builder.runtime(runtime.clone());
        }

        match builder.build() {
            Ok(engine) => {
                self.engine = Some(engine);
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(StoreSnapshot::empty(&self.config));
                Err(err)
            }
        }
    }

    /// Destroy the engine and return the snapshot to its empty defaults.
    /// Speed and looping survive.
    pub fn unload(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.destroy();
        }
        self.state.send_replace(StoreSnapshot::empty(&self.config));
    }

    // ------------------------------------------------------------------------
    // Controls (no-ops without a loaded engine)
    // ------------------------------------------------------------------------

    pub fn play(&self) {
        if let Some(engine) = &self.engine {
            engine.play();
        }
    }

    pub fn pause(&self) {
        if let Some(engine) = &self.engine {
            engine.pause();
        }
    }

    pub fn toggle_play_pause(&self) {
        if let Some(engine) = &self.engine {
            engine.toggle_play_pause();
        }
    }

    pub fn next_step(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.next_step())
    }

    pub fn previous_step(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.previous_step())
    }

    pub fn go_to_step(&self, index: usize) -> bool {
        self.engine.as_ref().is_some_and(|e| e.go_to_step(index))
    }

    pub fn reset(&self) {
        if let Some(engine) = &self.engine {
            engine.reset();
        }
    }

    /// Remembered for future loads even when nothing is loaded.
    pub fn set_speed(&mut self, speed: Speed) -> Result<(), PlaybackError> {
        self.config.speed = speed;
        self.state.send_modify(|s| s.speed = speed);
        match &self.engine {
            Some(engine) => engine.set_speed(speed),
            None => Ok(()),
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.config.looping = looping;
        self.state.send_modify(|s| s.looping = looping);
        if let Some(engine) = &self.engine {
            engine.set_looping(looping);
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot<P>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot<P> {
        self.state.borrow().clone()
    }

    pub fn engine(&self) -> Option<&PlaybackEngine<P>> {
        self.engine.as_ref()
    }

    pub fn current_step(&self) -> Option<Step<P>>
    where
        P: Clone,
    {
        self.state.borrow().current_step().cloned()
    }

    /// True when nothing is loaded.
    pub fn is_at_start(&self) -> bool {
        self.engine.as_ref().map_or(true, |e| e.is_at_start())
    }

    /// False when nothing is loaded.
    pub fn is_at_end(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_at_end())
    }

    pub fn total_steps(&self) -> usize {
        self.state.borrow().total_steps()
    }

    pub fn has_steps(&self) -> bool {
        self.total_steps() > 0
    }

    pub fn speed(&self) -> Speed {
        self.config.speed
    }
}

impl<P> Default for PlaybackStore<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + Sync + 'static> Drop for PlaybackStore<P> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.destroy();
        }
    }
}
