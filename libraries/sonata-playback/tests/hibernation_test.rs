//! Hibernation: idle resource release after a long pause, and the wake path

mod common;

use common::*;
use sonata_playback::{EngineConfig, ErrorKind, PlaybackState, StopReason};
use std::time::Duration;

#[test]
fn test_hibernation_round_trip() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    h.render(12.0);
    h.engine.pause();

    h.wait_for_hibernation();

    assert!(h.engine.is_hibernating());
    assert_eq!(h.engine.state(), PlaybackState::Paused);
    assert!(h.engine.has_source(), "reference survives hibernation");
    assert!(!h.engine.is_source_open(), "handle is released");
    assert!(!h.output.is_connected(), "output is released");
    assert_close(h.engine.progress(), 12.0);

    h.engine.resume();

    assert_eq!(h.engine.state(), PlaybackState::Playing);
    assert!(!h.engine.is_hibernating());
    assert!(h.engine.is_source_open());
    assert!(h.output.running());
    assert_eq!(h.engine.graph_reconnect_count(), 2);
    assert_close(h.engine.progress(), 12.0);

    h.render(2.0);
    assert_close(h.engine.progress(), 14.0);
    assert!(h.listener.errors().is_empty());
}

#[test]
fn test_hibernation_scenario_180s_track() {
    let h = Harness::new();
    h.engine.play(track("long", 180.0), false);

    assert!(h.engine.seek(90.0));
    let progress = h.engine.progress();
    assert!((89.9..=90.1).contains(&progress), "progress {progress}");

    h.engine.pause();
    h.wait(h.hibernation_delay() + Duration::from_secs(1));
    assert!(h.engine.is_hibernating());

    h.engine.resume();
    let progress = h.engine.progress();
    assert!((89.9..=90.1).contains(&progress), "progress {progress}");
    assert_eq!(h.engine.state(), PlaybackState::Playing);
}

#[test]
fn test_resume_before_delay_cancels_hibernation() {
    let h = Harness::new();
    h.engine.play(track("a", 120.0), false);
    h.engine.pause();

    h.wait(h.hibernation_delay() / 2);
    h.engine.resume();
    h.wait(h.hibernation_delay());

    assert!(!h.engine.is_hibernating());
    assert_eq!(h.engine.state(), PlaybackState::Playing);
    assert_eq!(h.engine.graph_reconnect_count(), 1);
}

#[test]
fn test_hibernation_timer_restarts_on_each_pause() {
    let h = Harness::new();
    h.engine.play(track("a", 120.0), false);

    h.engine.pause();
    h.wait(Duration::from_secs(20));
    h.engine.resume();
    h.engine.pause();
    h.wait(Duration::from_secs(20));

    // 40 s paused in total, but never 30 s in one stretch
    assert!(!h.engine.is_hibernating());

    h.wait(Duration::from_secs(11));
    assert!(h.engine.is_hibernating());
}

#[test]
fn test_stop_cancels_hibernation() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    h.engine.pause();
    h.engine.stop();

    assert_eq!(h.timers.pending(), 0);
    h.wait_for_hibernation();
    assert_eq!(h.engine.state(), PlaybackState::Stopped);
    assert!(!h.engine.is_hibernating());
}

#[test]
fn test_start_paused_hibernates() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), true);
    h.wait_for_hibernation();
    assert!(h.engine.is_hibernating());

    h.engine.resume();
    assert_eq!(h.engine.state(), PlaybackState::Playing);
    assert_eq!(h.listener.started().len(), 1);
}

#[test]
fn test_seek_while_hibernating_moves_wake_position() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    h.render(5.0);
    h.engine.pause();
    h.wait_for_hibernation();

    assert!(h.engine.seek(40.0));
    assert!(h.engine.is_hibernating());
    assert!(!h.engine.is_source_open());
    assert_close(h.engine.progress(), 40.0);

    assert!(!h.engine.seek(61.0));

    h.engine.resume();
    assert_close(h.engine.progress(), 40.0);
    h.render(1.0);
    assert_close(h.engine.progress(), 41.0);
}

#[test]
fn test_stop_while_hibernating_reports_saved_position() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    h.render(7.0);
    h.engine.pause();
    h.wait_for_hibernation();

    h.engine.stop();

    let finishes = h.listener.finishes();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].1, StopReason::UserAction);
    assert_close(finishes[0].2, 7.0);
    assert!(!h.engine.has_source());
}

#[test]
fn test_wake_failure_when_file_is_gone() {
    let h = Harness::new();
    let (source, faults) = flaky("a", 60.0);
    h.engine.play(source, false);
    h.render(3.0);
    h.engine.pause();
    h.wait_for_hibernation();

    faults.fail_open();
    h.engine.resume();

    assert_eq!(h.engine.state(), PlaybackState::Error);
    assert_eq!(h.listener.errors(), vec![ErrorKind::FileNotFound]);
    let finishes = h.listener.finishes();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].1, StopReason::Error);
    assert_close(finishes[0].2, 3.0);
    assert!(!h.engine.has_source());
}

#[test]
fn test_wake_failure_on_format_change() {
    let h = Harness::new();
    let (source, faults) = flaky("a", 60.0);
    h.engine.play(source, false);
    h.engine.pause();
    h.wait_for_hibernation();

    faults.change_format();
    h.engine.resume();

    assert_eq!(h.engine.state(), PlaybackState::Error);
    assert_eq!(h.listener.errors(), vec![ErrorKind::InvalidFormat]);
}

#[test]
fn test_wake_failure_on_device_reconnect() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    h.engine.pause();
    h.wait_for_hibernation();

    h.output.fail_next_connects(1);
    h.engine.resume();

    assert_eq!(h.engine.state(), PlaybackState::Error);
    assert_eq!(h.listener.errors(), vec![ErrorKind::Node]);
}

#[test]
fn test_wake_renews_session_token() {
    let h = Harness::new();
    h.engine.play(track("a", 60.0), false);
    let stale = h.engine.current_completion().unwrap();
    h.engine.pause();
    h.wait_for_hibernation();
    h.engine.resume();

    assert!(h.engine.session().unwrap().token > stale.token());

    stale.fire();
    assert_eq!(h.engine.state(), PlaybackState::Playing);
    assert!(h.listener.finishes().is_empty());
}

#[test]
fn test_configured_hibernation_delay() {
    let h = Harness::with_config(EngineConfig {
        hibernation_delay_ms: 2_000,
        ..EngineConfig::default()
    });
    h.engine.play(track("a", 60.0), false);
    h.engine.pause();

    h.wait(Duration::from_millis(1_999));
    assert!(!h.engine.is_hibernating());
    h.wait(Duration::from_millis(1));
    assert!(h.engine.is_hibernating());
}
