//! Randomized operation sequences against the engine's invariants.

use std::time::Duration;

use stepwise_core::{PlaybackEngine, RunState, Speed, SpeedPreset};
use stepwise_testing::fixtures::numbered;
use stepwise_testing::RecordingObserver;

fn check(engine: &PlaybackEngine<usize>, len: usize) {
    let index = engine.current_index().expect("sequence is non-empty");
    assert!(index < len, "index {index} escaped 0..{len}");
    assert_eq!(engine.has_pending_timer(), engine.is_playing());
    if engine.run_state() == RunState::Complete {
        assert!(engine.is_at_end());
    }
    let progress = engine.progress();
    assert!((0.0..=100.0).contains(&progress));
}

#[tokio::test(start_paused = true)]
async fn random_operations_preserve_invariants() {
    for seed in 0..8u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let len = rng.usize(1..8);
        let (observer, log) = RecordingObserver::new();
        let engine = PlaybackEngine::builder(numbered(len))
            .observer(observer)
            .build()
            .unwrap();

        for _ in 0..200 {
            match rng.usize(0..10) {
                0 => engine.play(),
                1 => engine.pause(),
                2 => engine.toggle_play_pause(),
                3 => {
                    engine.next_step();
                }
                4 => {
                    engine.previous_step();
                }
                5 => {
                    let target = rng.usize(0..len + 2);
                    assert_eq!(engine.go_to_step(target), target < len);
                }
                6 => engine.reset(),
                7 => {
                    let preset = SpeedPreset::ALL[rng.usize(0..SpeedPreset::ALL.len())];
                    engine.set_speed(Speed::from(preset)).unwrap();
                }
                8 => engine.set_looping(rng.bool()),
                _ => {
                    // One tick per interval, plus one already partly elapsed.
                    let delay = engine.step_delay();
                    let ms = rng.u64(0..3000);
                    let before = log.step_changes();
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    let ticks = log.step_changes() - before;
                    let bound = (ms / delay.as_millis() as u64) as usize + 1;
                    assert!(
                        ticks <= bound,
                        "seed {seed}: {ticks} step changes in {ms}ms at {delay:?}"
                    );
                }
            }
            check(&engine, len);
        }

        engine.destroy();
        assert!(!engine.has_pending_timer());
    }
}

#[tokio::test(start_paused = true)]
async fn completion_is_reported_once_per_run() {
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..20 {
        let len = rng.usize(2..6);
        let (observer, log) = RecordingObserver::new();
        let engine = PlaybackEngine::builder(numbered(len))
            .speed(SpeedPreset::ALL[rng.usize(0..SpeedPreset::ALL.len())])
            .observer(observer)
            .build()
            .unwrap();

        engine.play();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.completions(), 1);
        assert_eq!(engine.run_state(), RunState::Complete);
        assert_eq!(log.step_indices(), (1..len).collect::<Vec<_>>());
    }
}
