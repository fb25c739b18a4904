//! The playback state machine.
//!
//! [`Playback`] is pure: no IO, no async, no clock. Every operation updates
//! position and run state synchronously and records what must happen as a
//! consequence in an outbox: notifications for the observer and timer
//! directives for whoever owns the real timer. The engine drains the outbox
//! after each operation.
//!
//! Timer bookkeeping lives here so the single-timer invariant can be checked
//! without a runtime. Each arm gets a fresh generation; a tick carrying any
//! other generation, or arriving while disarmed, is stale and ignored.

use std::time::Duration;

use smallvec::SmallVec;

use crate::config::{step_delay, Speed};
use crate::error::PlaybackError;
use crate::observer::Notification;
use crate::state::RunState;
use crate::step::{Step, StepSequence};

/// What the timer owner must do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerDirective {
    /// Cancel the outstanding timer.
    Cancel,
    /// Start a repeating timer. Always preceded by `Cancel` if one was armed.
    Arm { generation: u64, period: Duration },
}

pub(crate) enum Output<P> {
    Notify(Notification<P>),
    Timer(TimerDirective),
}

pub(crate) type Outbox<P> = SmallVec<[Output<P>; 4]>;

/// Result of feeding a timer tick into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Moved forward one step; the timer keeps running.
    Advanced,
    /// Wrapped back to the first step; a new timer generation was armed.
    ///
    /// The run state stays Playing throughout: a wrap never passes through
    /// Idle, so observers see a step change to 0 and no play-state change.
    Looped,
    /// Reached the end without looping; the timer was cancelled.
    Completed,
    /// Tick from a cancelled or superseded timer. Nothing changed.
    Stale,
}

#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    armed: bool,
}

pub(crate) struct Playback<P> {
    sequence: StepSequence<P>,
    position: usize,
    state: RunState,
    speed: Speed,
    base_delay: Duration,
    looping: bool,
    timer: TimerSlot,
    destroyed: bool,
    outbox: Outbox<P>,
}

impl<P> Playback<P> {
    pub(crate) fn new(
        sequence: StepSequence<P>,
        speed: Speed,
        base_delay: Duration,
        looping: bool,
    ) -> Self {
        Self {
            sequence,
            position: 0,
            state: RunState::Idle,
            speed,
            base_delay,
            looping,
            timer: TimerSlot::default(),
            destroyed: false,
            outbox: SmallVec::new(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub(crate) fn sequence(&self) -> &StepSequence<P> {
        &self.sequence
    }

    /// `None` when nothing is loaded.
    pub(crate) fn current_index(&self) -> Option<usize> {
        (!self.sequence.is_empty()).then_some(self.position)
    }

    pub(crate) fn current_step(&self) -> Option<&Step<P>> {
        self.sequence.get(self.position)
    }

    pub(crate) fn total_steps(&self) -> usize {
        self.sequence.length()
    }

    /// Percentage of the sequence traversed; 0 for sequences of one step or
    /// fewer.
    pub(crate) fn progress(&self) -> f64 {
        progress(self.position, self.sequence.length())
    }

    pub(crate) fn is_at_start(&self) -> bool {
        self.position == 0
    }

    /// True at the last index, and for the empty sequence.
    pub(crate) fn is_at_end(&self) -> bool {
        self.sequence
            .last_index()
            .map_or(true, |last| self.position >= last)
    }

    pub(crate) fn run_state(&self) -> RunState {
        self.state
    }

    pub(crate) fn speed(&self) -> Speed {
        self.speed
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn timer_armed(&self) -> bool {
        self.timer.armed
    }

    pub(crate) fn step_delay(&self) -> Duration {
        step_delay(self.base_delay, self.speed)
    }

    pub(crate) fn take_outputs(&mut self) -> Outbox<P> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Start (or restart) timed advancement. Returns whether playback started.
    ///
    /// From the last index, playback restarts at the first step.
    pub(crate) fn play(&mut self) -> bool {
        if self.destroyed || self.state.is_playing() || self.sequence.is_empty() {
            return false;
        }

        if self.is_at_end() {
            self.rewind();
        }

        self.transition(RunState::Playing);
        self.arm_timer();
        true
    }

    /// Freeze at the current position. Returns whether playback was running.
    pub(crate) fn pause(&mut self) -> bool {
        if self.destroyed || !self.state.can_pause() {
            return false;
        }

        self.cancel_timer();
        self.transition(RunState::Paused);
        true
    }

    pub(crate) fn toggle_play_pause(&mut self) -> bool {
        if self.state.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Cancel the timer and return to Idle at the first step.
    pub(crate) fn reset(&mut self) {
        if self.destroyed {
            return;
        }

        self.cancel_timer();
        self.transition(RunState::Idle);
        self.rewind();
    }

    /// Change the speed. While playing, the timer is re-armed so the new
    /// interval applies from the very next tick.
    pub(crate) fn set_speed(&mut self, speed: Speed) -> Result<(), PlaybackError> {
        if self.destroyed {
            return Err(PlaybackError::Destroyed);
        }

        self.speed = speed;
        if self.state.is_playing() {
            self.arm_timer();
        }
        Ok(())
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        if !self.destroyed {
            self.looping = looping;
        }
    }

    /// Replace the sequence. Stops playback and returns to Idle at step 0.
    pub(crate) fn load_steps(&mut self, sequence: StepSequence<P>) -> Result<(), PlaybackError> {
        if self.destroyed {
            return Err(PlaybackError::Destroyed);
        }

        self.cancel_timer();
        self.transition(RunState::Idle);
        self.sequence = sequence;
        self.rewind();
        Ok(())
    }

    /// Cancel the timer and make the machine inert.
    ///
    /// Pending notifications are discarded; only the cancel directive is left
    /// in the outbox.
    pub(crate) fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.outbox.clear();
        self.cancel_timer();
        self.destroyed = true;
        self.sequence = StepSequence::empty();
        self.position = 0;
        self.state = RunState::Idle;
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub(crate) fn next_step(&mut self) -> bool {
        if self.destroyed || self.is_at_end() {
            return false;
        }
        self.move_to(self.position + 1);
        true
    }

    pub(crate) fn previous_step(&mut self) -> bool {
        if self.destroyed || self.is_at_start() {
            return false;
        }
        self.move_to(self.position - 1);
        true
    }

    /// Seek to `index`. Out-of-range input is rejected, not clamped.
    pub(crate) fn go_to_step(&mut self, index: usize) -> bool {
        if self.destroyed || index >= self.sequence.length() {
            return false;
        }
        self.move_to(index);
        true
    }

    // ========================================================================
    // Timer
    // ========================================================================

    pub(crate) fn tick(&mut self, generation: u64) -> TickOutcome {
        if self.destroyed
            || !self.state.is_playing()
            || !self.timer.armed
            || self.timer.generation != generation
        {
            return TickOutcome::Stale;
        }

        if self.next_step() {
            return TickOutcome::Advanced;
        }

        self.cancel_timer();
        if self.looping {
            // Rewind in place; no Idle round trip.
            self.rewind();
            self.arm_timer();
            TickOutcome::Looped
        } else {
            self.transition(RunState::Complete);
            self.notify(Notification::Completed);
            TickOutcome::Completed
        }
    }

    fn arm_timer(&mut self) {
        self.cancel_timer();
        self.timer.generation += 1;
        self.timer.armed = true;
        let directive = TimerDirective::Arm {
            generation: self.timer.generation,
            period: self.step_delay(),
        };
        self.outbox.push(Output::Timer(directive));
    }

    fn cancel_timer(&mut self) {
        if self.timer.armed {
            self.timer.armed = false;
            self.outbox.push(Output::Timer(TimerDirective::Cancel));
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn move_to(&mut self, index: usize) {
        self.position = index;
        // Leaving the last step un-completes the run.
        if self.state.is_complete() && !self.is_at_end() {
            self.state = RunState::Idle;
        }
        self.notify_step();
    }

    fn rewind(&mut self) {
        self.position = 0;
        self.notify_step();
    }

    fn transition(&mut self, next: RunState) {
        let before = self.state.flags();
        self.state = next;
        let (is_playing, is_paused) = next.flags();
        if before != (is_playing, is_paused) {
            self.notify(Notification::PlayStateChanged {
                is_playing,
                is_paused,
            });
        }
    }

    fn notify_step(&mut self) {
        if self.sequence.is_empty() {
            return;
        }
        self.notify(Notification::StepChanged {
            sequence: self.sequence.clone(),
            index: self.position,
        });
    }

    fn notify(&mut self, notification: Notification<P>) {
        self.outbox.push(Output::Notify(notification));
    }
}

/// `position / (len - 1) * 100`, or 0 when `len <= 1`.
pub fn progress(position: usize, len: usize) -> f64 {
    if len <= 1 {
        return 0.0;
    }
    position as f64 / (len - 1) as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_STEP_DELAY;
    use crate::observer::PlaybackEvent;

    fn machine(n: usize) -> Playback<()> {
        let seq = StepSequence::from_payloads((0..n).map(|i| (format!("step {i}"), ())));
        Playback::new(seq, Speed::NORMAL, DEFAULT_STEP_DELAY, false)
    }

    fn events(m: &mut Playback<()>) -> Vec<PlaybackEvent> {
        m.take_outputs()
            .into_iter()
            .filter_map(|o| match o {
                Output::Notify(n) => Some(n.event()),
                Output::Timer(_) => None,
            })
            .collect()
    }

    fn directives(m: &mut Playback<()>) -> Vec<TimerDirective> {
        m.take_outputs()
            .into_iter()
            .filter_map(|o| match o {
                Output::Timer(t) => Some(t),
                Output::Notify(_) => None,
            })
            .collect()
    }

    fn armed_generation(m: &mut Playback<()>) -> u64 {
        match directives(m).last() {
            Some(TimerDirective::Arm { generation, .. }) => *generation,
            other => panic!("expected an arm directive, got {other:?}"),
        }
    }

    #[test]
    fn fresh_machine_is_idle_at_start() {
        for n in 0..4 {
            let m = machine(n);
            assert_eq!(m.run_state(), RunState::Idle);
            assert!(m.is_at_start());
            assert_eq!(m.current_index(), if n == 0 { None } else { Some(0) });
        }
    }

    #[test]
    fn navigation_rejects_boundaries_silently() {
        let mut m = machine(3);
        assert!(!m.previous_step());
        assert!(m.next_step());
        assert!(m.next_step());
        assert!(!m.next_step());
        assert_eq!(m.current_index(), Some(2));
        assert!(!m.go_to_step(3));
        assert_eq!(m.current_index(), Some(2));
        assert_eq!(
            events(&mut m),
            vec![
                PlaybackEvent::StepChanged { index: 1 },
                PlaybackEvent::StepChanged { index: 2 },
            ]
        );
    }

    #[test]
    fn progress_is_zero_for_short_sequences() {
        assert_eq!(progress(0, 0), 0.0);
        assert_eq!(progress(0, 1), 0.0);
        assert_eq!(progress(2, 5), 50.0);
        assert_eq!(progress(4, 5), 100.0);
    }

    #[test]
    fn play_arms_exactly_one_timer() {
        let mut m = machine(3);
        assert!(m.play());
        assert!(!m.play());
        assert_eq!(
            directives(&mut m),
            vec![TimerDirective::Arm {
                generation: 1,
                period: Duration::from_millis(1000)
            }]
        );
    }

    #[test]
    fn set_speed_cancels_before_rearming() {
        let mut m = machine(3);
        m.play();
        m.take_outputs();

        m.set_speed(Speed::new(2.0).unwrap()).unwrap();
        assert_eq!(
            directives(&mut m),
            vec![
                TimerDirective::Cancel,
                TimerDirective::Arm {
                    generation: 2,
                    period: Duration::from_millis(500)
                },
            ]
        );
        assert_eq!(m.tick(1), TickOutcome::Stale);
        assert_eq!(m.tick(2), TickOutcome::Advanced);
    }

    #[test]
    fn set_speed_while_idle_does_not_arm() {
        let mut m = machine(3);
        m.set_speed(Speed::new(0.5).unwrap()).unwrap();
        assert!(directives(&mut m).is_empty());
        assert_eq!(m.step_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn pause_makes_pending_ticks_stale() {
        let mut m = machine(3);
        m.play();
        let generation = armed_generation(&mut m);
        assert!(m.pause());
        assert_eq!(m.tick(generation), TickOutcome::Stale);
        assert_eq!(m.current_index(), Some(0));

        assert!(m.play());
        assert_eq!(m.current_index(), Some(0));
        assert_ne!(armed_generation(&mut m), generation);
    }

    #[test]
    fn reaching_the_end_completes_once() {
        let mut m = machine(2);
        m.play();
        let generation = armed_generation(&mut m);
        assert_eq!(m.tick(generation), TickOutcome::Advanced);
        assert_eq!(m.tick(generation), TickOutcome::Completed);
        assert_eq!(m.tick(generation), TickOutcome::Stale);
        assert_eq!(m.run_state(), RunState::Complete);
        assert!(!m.timer_armed());

        let seen = events(&mut m);
        assert_eq!(
            seen,
            vec![
                PlaybackEvent::StepChanged { index: 1 },
                PlaybackEvent::PlayStateChanged {
                    is_playing: false,
                    is_paused: false
                },
                PlaybackEvent::Completed,
            ]
        );
    }

    #[test]
    fn looping_rewinds_without_completing() {
        let mut m = machine(3);
        m.set_looping(true);
        m.play();
        let generation = armed_generation(&mut m);
        m.tick(generation);
        m.tick(generation);
        m.take_outputs();

        assert_eq!(m.tick(generation), TickOutcome::Looped);
        assert_eq!(m.current_index(), Some(0));
        assert_eq!(m.run_state(), RunState::Playing);

        let outputs = m.take_outputs();
        let seen: Vec<_> = outputs
            .iter()
            .filter_map(|o| match o {
                Output::Notify(n) => Some(n.event()),
                Output::Timer(_) => None,
            })
            .collect();
        assert_eq!(seen, vec![PlaybackEvent::StepChanged { index: 0 }]);
        assert!(outputs.iter().any(|o| matches!(
            o,
            Output::Timer(TimerDirective::Arm { generation: 2, .. })
        )));
    }

    #[test]
    fn play_from_the_end_restarts() {
        let mut m = machine(3);
        m.go_to_step(2);
        m.take_outputs();
        assert!(m.play());
        assert_eq!(m.current_index(), Some(0));
        assert_eq!(
            events(&mut m),
            vec![
                PlaybackEvent::StepChanged { index: 0 },
                PlaybackEvent::PlayStateChanged {
                    is_playing: true,
                    is_paused: false
                },
            ]
        );
    }

    #[test]
    fn play_on_empty_sequence_is_refused() {
        let mut m = machine(0);
        assert!(!m.play());
        assert!(m.take_outputs().is_empty());
    }

    #[test]
    fn stepping_back_from_complete_returns_to_idle() {
        let mut m = machine(2);
        m.play();
        let generation = armed_generation(&mut m);
        m.tick(generation);
        m.tick(generation);
        assert!(m.run_state().is_complete());

        assert!(m.previous_step());
        assert_eq!(m.run_state(), RunState::Idle);
    }

    #[test]
    fn reset_while_playing_reports_idle() {
        let mut m = machine(4);
        m.play();
        let generation = armed_generation(&mut m);
        m.tick(generation);
        m.take_outputs();

        m.reset();
        let outputs = m.take_outputs();
        assert!(matches!(
            outputs.first(),
            Some(Output::Timer(TimerDirective::Cancel))
        ));
        let seen: Vec<_> = outputs
            .iter()
            .filter_map(|o| match o {
                Output::Notify(n) => Some(n.event()),
                Output::Timer(_) => None,
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                PlaybackEvent::PlayStateChanged {
                    is_playing: false,
                    is_paused: false
                },
                PlaybackEvent::StepChanged { index: 0 },
            ]
        );
        assert_eq!(m.tick(generation), TickOutcome::Stale);
    }

    #[test]
    fn load_steps_swaps_sequence_and_rewinds() {
        let mut m = machine(3);
        m.go_to_step(2);
        m.play();
        m.take_outputs();

        let replacement = StepSequence::from_payloads([("x", ()), ("y", ())]);
        m.load_steps(replacement.clone()).unwrap();
        assert!(m.sequence().ptr_eq(&replacement));
        assert_eq!(m.run_state(), RunState::Idle);
        assert_eq!(m.current_index(), Some(0));
        assert!(!m.timer_armed());
    }

    #[test]
    fn destroy_leaves_only_a_cancel() {
        let mut m = machine(3);
        m.play();
        m.next_step();
        m.destroy();

        let outputs = m.take_outputs();
        assert_eq!(outputs.len(), 1);
        assert!(matches!(outputs[0], Output::Timer(TimerDirective::Cancel)));

        assert!(!m.play());
        assert!(!m.next_step());
        assert!(matches!(
            m.set_speed(Speed::NORMAL),
            Err(PlaybackError::Destroyed)
        ));
        assert!(m.take_outputs().is_empty());
        assert_eq!(m.total_steps(), 0);
    }
}
