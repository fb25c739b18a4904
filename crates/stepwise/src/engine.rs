//! The playback engine: a [`Playback`] machine driven by a tokio timer.
//!
//! ```text
//! control call ──► lock ─► Playback::op() ─► outbox ─┬─► TimerDirective ─► abort / spawn ticker
//!                                                    └─► Notification ──► pending queue
//!              unlock ─► flush pending ─► PlaybackObserver
//!
//! ticker task ──► interval.tick() ─► upgrade Weak ─► same path with Playback::tick(generation)
//! ```
//!
//! ## Invariants
//!
//! 1. **At most one ticker per engine.** Arming always aborts the previous
//!    task before spawning a new one.
//! 2. **No stale ticks.** Every ticker carries the generation it was armed
//!    with; the machine ignores ticks from any other generation, so a ticker
//!    that races its own abort cannot change state.
//! 3. **Ordered notifications.** Notifications are queued under the state
//!    lock in transition order and delivered by a single drainer.
//! 4. **Destroy is final.** It cancels the ticker, drops the observer and
//!    turns every later operation into a no-op.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::{PlaybackConfig, Speed};
use crate::error::PlaybackError;
use crate::machine::{Output, Playback, TickOutcome, TimerDirective};
use crate::observer::{Notification, PlaybackObserver};
use crate::state::RunState;
use crate::step::{Step, StepSequence};

/// Identifies one engine instance in logs and store snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`PlaybackEngine`].
pub struct EngineBuilder<P> {
    sequence: StepSequence<P>,
    config: PlaybackConfig,
    observer: Option<Box<dyn PlaybackObserver<P>>>,
    runtime: Option<Handle>,
    session: Option<SessionId>,
}

impl<P> EngineBuilder<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(sequence: StepSequence<P>) -> Self {
        Self {
            sequence,
            config: PlaybackConfig::default(),
            observer: None,
            runtime: None,
            session: None,
        }
    }

    /// Replace every option at once.
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn speed(mut self, speed: impl Into<Speed>) -> Self {
        self.config.speed = speed.into();
        self
    }

    pub fn auto_play(mut self, auto_play: bool) -> Self {
        self.config.auto_play = auto_play;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.config.looping = looping;
        self
    }

    /// Tick interval at speed 1.0, rounded up to whole milliseconds.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        let millis = delay.as_nanos().div_ceil(1_000_000);
        self.config.step_delay_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn observer(mut self, observer: impl PlaybackObserver<P> + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Runtime that hosts the timer. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Use a caller-chosen session id, e.g. one an observer already knows.
    pub fn session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Validate the configuration and start the session.
    ///
    /// With `auto_play` set and a non-empty sequence, playback starts
    /// immediately and the observer sees the first play-state change.
    pub fn build(self) -> Result<PlaybackEngine<P>, PlaybackError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?,
        };

        let machine = Playback::new(
            self.sequence,
            self.config.speed,
            self.config.base_delay(),
            self.config.looping,
        );
        let session = self.session.unwrap_or_default();
        debug!(
            %session,
            steps = machine.total_steps(),
            speed = %machine.speed(),
            looping = machine.is_looping(),
            "playback session created"
        );

        let engine = PlaybackEngine {
            shared: Arc::new(Shared {
                session,
                runtime,
                core: Mutex::new(Core {
                    machine,
                    ticker: None,
                    pending: VecDeque::new(),
                }),
                observer: Mutex::new(self.observer),
            }),
        };

        if self.config.auto_play {
            engine.play();
        }
        Ok(engine)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A playback session over one [`StepSequence`].
///
/// Cloning yields another handle to the same session. The session's timer
/// is cancelled by [`destroy`](Self::destroy) or when the last handle is
/// dropped.
pub struct PlaybackEngine<P> {
    shared: Arc<Shared<P>>,
}

struct Shared<P> {
    session: SessionId,
    runtime: Handle,
    core: Mutex<Core<P>>,
    observer: Mutex<Option<Box<dyn PlaybackObserver<P>>>>,
}

struct Core<P> {
    machine: Playback<P>,
    ticker: Option<Ticker>,
    pending: VecDeque<Notification<P>>,
}

/// The spawned timer task. Aborted on drop.
struct Ticker {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<P> Clone for PlaybackEngine<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> fmt::Debug for PlaybackEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("PlaybackEngine")
            .field("session", &self.shared.session)
            .field("state", &core.machine.run_state())
            .field("index", &core.machine.current_index())
            .field("steps", &core.machine.total_steps())
            .finish()
    }
}

impl<P> PlaybackEngine<P>
where
    P: Send + Sync + 'static,
{
    pub fn builder(sequence: StepSequence<P>) -> EngineBuilder<P> {
        EngineBuilder::new(sequence)
    }

    // ------------------------------------------------------------------------
    // Playback control
    // ------------------------------------------------------------------------

    /// Start timed advancement. From Complete (or the last step) this
    /// restarts at step 0. No-op while playing or when nothing is loaded.
    pub fn play(&self) {
        self.shared.apply("play", |m| {
            m.play();
        });
    }

    /// Cancel the timer and freeze the position. No-op unless playing.
    pub fn pause(&self) {
        self.shared.apply("pause", |m| {
            m.pause();
        });
    }

    pub fn toggle_play_pause(&self) {
        self.shared.apply("toggle_play_pause", |m| {
            m.toggle_play_pause();
        });
    }

    /// Cancel the timer and return to Idle at step 0.
    pub fn reset(&self) {
        self.shared.apply("reset", |m| m.reset());
    }

    /// Change the speed; while playing the new interval applies from the
    /// next tick.
    pub fn set_speed(&self, speed: Speed) -> Result<(), PlaybackError> {
        self.shared.apply("set_speed", |m| m.set_speed(speed))
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.apply("set_looping", |m| m.set_looping(looping));
    }

    /// Swap in a new sequence: stops playback, returns to Idle at step 0.
    pub fn load_steps(&self, sequence: StepSequence<P>) -> Result<(), PlaybackError> {
        self.shared.apply("load_steps", |m| m.load_steps(sequence))
    }

    /// Cancel the timer, release the observer and make every later operation
    /// a no-op.
    pub fn destroy(&self) {
        self.shared.apply("destroy", |m| m.destroy());
        // Inside an observer callback the drainer holds the slot; it drops the
        // observer itself once the callback returns.
        if let Some(mut observer) = self.shared.observer.try_lock() {
            observer.take();
        }
        debug!(session = %self.shared.session, "playback session destroyed");
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Advance one step. `false` at the last step.
    pub fn next_step(&self) -> bool {
        self.shared.apply("next_step", |m| m.next_step())
    }

    /// Go back one step. `false` at step 0.
    pub fn previous_step(&self) -> bool {
        self.shared.apply("previous_step", |m| m.previous_step())
    }

    /// Seek to `index`. `false`, with the position unchanged, when `index` is
    /// outside the sequence.
    pub fn go_to_step(&self, index: usize) -> bool {
        self.shared.apply("go_to_step", |m| m.go_to_step(index))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn session_id(&self) -> SessionId {
        self.shared.session
    }

    /// The loaded sequence (shared, not copied).
    pub fn sequence(&self) -> StepSequence<P> {
        self.shared.core.lock().machine.sequence().clone()
    }

    pub fn current_step(&self) -> Option<Step<P>>
    where
        P: Clone,
    {
        self.shared.core.lock().machine.current_step().cloned()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.shared.core.lock().machine.current_index()
    }

    pub fn total_steps(&self) -> usize {
        self.shared.core.lock().machine.total_steps()
    }

    /// `index / (len - 1) * 100`; 0 for sequences of one step or fewer.
    pub fn progress(&self) -> f64 {
        self.shared.core.lock().machine.progress()
    }

    pub fn is_at_start(&self) -> bool {
        self.shared.core.lock().machine.is_at_start()
    }

    pub fn is_at_end(&self) -> bool {
        self.shared.core.lock().machine.is_at_end()
    }

    pub fn run_state(&self) -> RunState {
        self.shared.core.lock().machine.run_state()
    }

    pub fn is_playing(&self) -> bool {
        self.run_state().is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.run_state().is_paused()
    }

    pub fn is_complete(&self) -> bool {
        self.run_state().is_complete()
    }

    pub fn speed(&self) -> Speed {
        self.shared.core.lock().machine.speed()
    }

    pub fn is_looping(&self) -> bool {
        self.shared.core.lock().machine.is_looping()
    }

    /// Current tick interval.
    pub fn step_delay(&self) -> Duration {
        self.shared.core.lock().machine.step_delay()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.core.lock().machine.is_destroyed()
    }

    /// Whether a ticker task is outstanding. Never true while not playing.
    pub fn has_pending_timer(&self) -> bool {
        let core = self.shared.core.lock();
        debug_assert_eq!(core.ticker.is_some(), core.machine.timer_armed());
        core.ticker.is_some()
    }
}

impl<P> Shared<P>
where
    P: Send + Sync + 'static,
{
    /// Run one machine operation, execute its outputs, then notify.
    fn apply<R>(self: &Arc<Self>, op: &'static str, f: impl FnOnce(&mut Playback<P>) -> R) -> R {
        let result = {
            let mut core = self.core.lock();
            if core.machine.is_destroyed() && op != "destroy" {
                warn!(session = %self.session, op, "operation on destroyed playback session ignored");
            }
            let result = f(&mut core.machine);
            self.execute(&mut core);
            trace!(
                session = %self.session,
                op,
                state = %core.machine.run_state(),
                index = ?core.machine.current_index(),
                "playback operation applied"
            );
            result
        };
        self.flush();
        result
    }

    /// Called by the ticker. Returns whether the ticker should keep running.
    fn on_tick(self: &Arc<Self>, generation: u64) -> bool {
        let outcome = {
            let mut core = self.core.lock();
            let outcome = core.machine.tick(generation);
            self.execute(&mut core);
            outcome
        };

        match outcome {
            TickOutcome::Advanced => {}
            TickOutcome::Looped => debug!(session = %self.session, "playback looped"),
            TickOutcome::Completed => debug!(session = %self.session, "playback complete"),
            TickOutcome::Stale => trace!(session = %self.session, generation, "stale tick dropped"),
        }
        self.flush();
        outcome == TickOutcome::Advanced
    }

    /// Carry out the machine's outbox: timer directives now, notifications
    /// queued for [`flush`](Self::flush).
    fn execute(self: &Arc<Self>, core: &mut Core<P>) {
        for output in core.machine.take_outputs() {
            match output {
                Output::Timer(TimerDirective::Cancel) => {
                    if let Some(ticker) = core.ticker.take() {
                        trace!(session = %self.session, generation = ticker.generation, "timer cancelled");
                    }
                }
                Output::Timer(TimerDirective::Arm { generation, period }) => {
                    // Dropping the previous ticker aborts it.
                    core.ticker.take();
                    let start = Instant::now() + period;
                    let task = self
                        .runtime
                        .spawn(run_ticker(Arc::downgrade(self), generation, start, period));
                    core.ticker = Some(Ticker { generation, task });
                    trace!(session = %self.session, generation, ?period, "timer armed");
                }
                Output::Notify(notification) => core.pending.push_back(notification),
            }
        }
    }

    /// Deliver queued notifications. Only one caller drains at a time; a
    /// re-entrant call from inside a callback returns immediately and its
    /// notifications are picked up by the outer loop.
    fn flush(&self) {
        loop {
            let Some(mut observer) = self.observer.try_lock() else {
                return;
            };

            loop {
                let next = {
                    let mut core = self.core.lock();
                    if core.machine.is_destroyed() {
                        core.pending.clear();
                        Err(())
                    } else {
                        Ok(core.pending.pop_front())
                    }
                };
                let notification = match next {
                    Ok(Some(notification)) => notification,
                    Ok(None) => break,
                    Err(()) => {
                        // Destroyed, possibly from inside the last callback.
                        observer.take();
                        break;
                    }
                };
                match observer.as_mut() {
                    Some(target) => notification.deliver(target.as_mut()),
                    None => trace!(session = %self.session, event = ?notification.event(), "no observer attached"),
                }
            }

            drop(observer);
            let core = self.core.lock();
            if core.machine.is_destroyed() {
                drop(core);
                // Whoever releases the slot last after a destroy clears it;
                // a failed try_lock means another drainer will.
                if let Some(mut slot) = self.observer.try_lock() {
                    slot.take();
                }
                return;
            }
            if core.pending.is_empty() {
                return;
            }
        }
    }
}

async fn run_ticker<P>(shared: Weak<Shared<P>>, generation: u64, start: Instant, period: Duration)
where
    P: Send + Sync + 'static,
{
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.on_tick(generation) {
            break;
        }
    }
}
