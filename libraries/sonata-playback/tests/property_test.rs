//! Property-based tests for the playback state machine
//!
//! Random operation sequences must never panic, never leave an internal state
//! published, and always keep the session invariants.

mod common;

use common::*;
use proptest::prelude::*;
use sonata_playback::{CompletionHandle, PlaybackState, StopReason};
use std::time::Duration;

// ===== Helpers =====

const TRACK_SECONDS: f64 = 4.0;

#[derive(Debug, Clone)]
enum Op {
    Play,
    PlayPaused,
    Restore(f64),
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Render(f64),
    Wait(u64),
    FireStaleCompletion,
    DeviceError,
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Play),
        1 => Just(Op::PlayPaused),
        1 => (-1.0f64..6.0).prop_map(Op::Restore),
        2 => Just(Op::Pause),
        2 => Just(Op::Resume),
        2 => Just(Op::Stop),
        2 => (-1.0f64..6.0).prop_map(Op::Seek),
        3 => (0.0f64..3.0).prop_map(Op::Render),
        2 => (0u64..45).prop_map(Op::Wait),
        1 => Just(Op::FireStaleCompletion),
        1 => Just(Op::DeviceError),
    ]
}

fn check_invariants(h: &Harness) -> Result<(), TestCaseError> {
    let state = h.engine.state();
    prop_assert!(!state.is_internal(), "internal state {state:?} leaked");
    prop_assert!(state != PlaybackState::Bufferring, "left bufferring");

    let progress = h.engine.progress();
    let duration = h.engine.duration();
    prop_assert!(
        (0.0..=duration).contains(&progress) || (progress == 0.0 && duration == 0.0),
        "progress {progress} outside [0, {duration}]"
    );

    if state.has_track() {
        prop_assert!(h.engine.has_source(), "{state:?} without a source");
    } else {
        prop_assert!(!h.engine.has_source(), "{state:?} still holds a source");
        prop_assert_eq!(progress, 0.0);
    }

    if h.engine.is_hibernating() {
        prop_assert_eq!(state, PlaybackState::Paused);
        prop_assert!(!h.engine.is_source_open());
    }

    for (new, previous) in h.listener.states() {
        prop_assert!(new != previous, "duplicate notification for {new:?}");
        prop_assert!(!new.is_internal());
    }
    Ok(())
}

// ===== Property Tests =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: any operation sequence keeps the session invariants
    #[test]
    fn operation_sequences_keep_invariants(ops in prop::collection::vec(arbitrary_op(), 1..30)) {
        let h = Harness::new();
        let mut stale: Option<CompletionHandle> = None;
        let mut loads = 0usize;

        for op in ops {
            match op {
                Op::Play => {
                    loads += 1;
                    h.engine.play(track("t", TRACK_SECONDS), false);
                }
                Op::PlayPaused => {
                    loads += 1;
                    h.engine.play(track("t", TRACK_SECONDS), true);
                }
                Op::Restore(at) => {
                    loads += 1;
                    h.engine.restore(track("t", TRACK_SECONDS), at, true);
                }
                Op::Pause => h.engine.pause(),
                Op::Resume => h.engine.resume(),
                Op::Stop => h.engine.stop(),
                Op::Seek(to) => {
                    let accepted = h.engine.seek(to);
                    if !(0.0..=TRACK_SECONDS).contains(&to) {
                        prop_assert!(!accepted);
                    }
                }
                Op::Render(seconds) => h.render(seconds),
                Op::Wait(secs) => h.wait(Duration::from_secs(secs)),
                Op::FireStaleCompletion => {
                    if let Some(completion) = stale.take() {
                        completion.fire();
                        h.engine.state();
                    }
                }
                Op::DeviceError => {
                    h.output.raise_error("injected");
                    h.engine.state();
                }
            }

            if stale.is_none() {
                stale = h.engine.current_completion();
            }
            check_invariants(&h)?;
        }

        // At most one finish per loaded track
        let finishes = h.listener.finishes();
        prop_assert!(finishes.len() <= loads, "{} finishes for {} loads", finishes.len(), loads);
        for (_, reason, progress, duration) in finishes {
            prop_assert!(reason != StopReason::None);
            prop_assert!(progress >= 0.0 && progress <= duration);
        }
    }

    /// Property: seek then progress lands on the target
    #[test]
    fn seek_lands_on_target(target in 0.0f64..=TRACK_SECONDS, paused in any::<bool>()) {
        let h = Harness::new();
        h.engine.play(track("t", TRACK_SECONDS), paused);

        prop_assert!(h.engine.seek(target));
        let progress = h.engine.progress();
        prop_assert!((progress - target).abs() <= 0.1, "seek {} reported {}", target, progress);
    }
}

// ===== Exhaustive Checks =====

#[test]
fn test_stop_twice_from_every_state() {
    for setup in 0..4 {
        let h = Harness::new();
        match setup {
            0 => {}
            1 => h.engine.play(track("t", TRACK_SECONDS), false),
            2 => h.engine.play(track("t", TRACK_SECONDS), true),
            _ => {
                h.engine.play(track("t", TRACK_SECONDS), false);
                h.render(TRACK_SECONDS + 1.0);
            }
        }
        let before = h.listener.finishes().len();

        h.engine.stop();
        let after_first = h.listener.finishes().len();
        h.engine.stop();

        assert!(after_first - before <= 1);
        assert_eq!(h.listener.finishes().len(), after_first);
    }
}
