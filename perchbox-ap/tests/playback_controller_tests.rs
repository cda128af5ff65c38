//! Playback worker behavior against a recording sink
//!
//! Covers the phase sequence on interrupt, continuous play across natural
//! completion, skipping of unplayable tracks and the single-voice guarantee.

mod helpers;

use helpers::{fake_libraries, MockSink};
use perchbox_ap::library::TrackId;
use perchbox_ap::playback::{PlaybackController, PlaybackEvent, PlaybackPhase, PlaybackSettings};
use perchbox_ap::state::Category;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn fast_settings() -> PlaybackSettings {
    PlaybackSettings {
        fade_out: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
        interrupt_timeout: Duration::from_secs(1),
    }
}

async fn next_event(events: &mut UnboundedReceiver<PlaybackEvent>) -> PlaybackEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for playback event")
        .expect("playback event channel closed")
}

async fn collect_started(
    events: &mut UnboundedReceiver<PlaybackEvent>,
    count: usize,
) -> Vec<TrackId> {
    let mut started = Vec::new();
    while started.len() < count {
        if let PlaybackEvent::TrackStarted { track, .. } = next_event(events).await {
            started.push(track);
        }
    }
    started
}

#[tokio::test]
async fn test_interrupt_phase_sequence() {
    let (sink, state) = MockSink::new(Duration::from_secs(10));
    let (mut controller, mut events) =
        PlaybackController::spawn(move || Ok(sink), fake_libraries(3, 1), fast_settings()).unwrap();

    controller.authorize(Category::A, 1).unwrap();
    collect_started(&mut events, 1).await;
    controller.interrupt().await.unwrap();
    assert_eq!(controller.phase(), PlaybackPhase::Idle);

    controller.shutdown().await.unwrap();

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PlaybackEvent::PhaseChanged(phase) = event {
            phases.push(phase);
        }
    }
    assert_eq!(phases, vec![PlaybackPhase::Interrupting, PlaybackPhase::Idle]);

    let state = state.lock().unwrap();
    assert_eq!(state.fade_outs, 1);
    assert_eq!(state.overlaps, 0);
}

#[tokio::test]
async fn test_phases_up_to_playing() {
    let (sink, _state) = MockSink::new(Duration::from_secs(10));
    let (mut controller, mut events) =
        PlaybackController::spawn(move || Ok(sink), fake_libraries(3, 1), fast_settings()).unwrap();

    controller.authorize(Category::B, 4).unwrap();

    assert_eq!(next_event(&mut events).await, PlaybackEvent::PhaseChanged(PlaybackPhase::Loading));
    assert_eq!(next_event(&mut events).await, PlaybackEvent::PhaseChanged(PlaybackPhase::Playing));
    match next_event(&mut events).await {
        PlaybackEvent::TrackStarted {
            interval,
            category,
            track,
        } => {
            assert_eq!(interval, 4);
            assert_eq!(category, Category::B);
            assert!(track.starts_with("reg"));
        }
        other => panic!("expected TrackStarted, got {:?}", other),
    }

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_natural_completion_continues_through_cycles() {
    let (sink, state) = MockSink::new(Duration::from_millis(30));
    let (mut controller, mut events) =
        PlaybackController::spawn(move || Ok(sink), fake_libraries(3, 9), fast_settings()).unwrap();

    controller.authorize(Category::A, 1).unwrap();
    let started = collect_started(&mut events, 7).await;
    controller.shutdown().await.unwrap();

    for cycle in started.chunks(3).filter(|c| c.len() == 3) {
        let mut sorted = cycle.to_vec();
        sorted.sort();
        assert_eq!(sorted, vec!["ran1.wav", "ran2.wav", "ran3.wav"]);
    }
    for pair in started.windows(2) {
        assert_ne!(pair[0], pair[1], "track repeated back to back");
    }
    assert_eq!(state.lock().unwrap().overlaps, 0);
}

#[tokio::test]
async fn test_unplayable_track_is_skipped() {
    let (sink, state) = MockSink::new(Duration::from_millis(20));
    let sink = sink.failing(&["ran2.wav"]);
    let (mut controller, mut events) =
        PlaybackController::spawn(move || Ok(sink), fake_libraries(3, 3), fast_settings()).unwrap();

    controller.authorize(Category::A, 1).unwrap();

    let mut skipped = Vec::new();
    let mut started = Vec::new();
    while skipped.is_empty() || started.len() < 4 {
        match next_event(&mut events).await {
            PlaybackEvent::TrackSkipped { track, .. } => skipped.push(track),
            PlaybackEvent::TrackStarted { track, .. } => started.push(track),
            _ => {}
        }
    }
    controller.shutdown().await.unwrap();

    assert!(skipped.iter().all(|t| t == "ran2.wav"));
    assert!(!started.iter().any(|t| t == "ran2.wav"));
    assert_eq!(state.lock().unwrap().overlaps, 0);
}

#[tokio::test]
async fn test_all_tracks_failing_goes_idle_until_next_authorization() {
    let (sink, state) = MockSink::new(Duration::from_millis(20));
    let sink = sink.failing(&["reg1.wav", "reg2.wav"]);
    let (mut controller, mut events) =
        PlaybackController::spawn(move || Ok(sink), fake_libraries(2, 5), fast_settings()).unwrap();

    controller.authorize(Category::B, 1).unwrap();
    let mut skips = 0;
    while skips < 2 {
        match next_event(&mut events).await {
            PlaybackEvent::TrackSkipped { .. } => skips += 1,
            PlaybackEvent::TrackStarted { track, .. } => panic!("{} should not start", track),
            _ => {}
        }
    }
    // Worker gives up after one full cycle of failures
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.phase(), PlaybackPhase::Idle);
    assert_eq!(state.lock().unwrap().loads.len(), 2);

    controller.authorize(Category::B, 2).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.lock().unwrap().loads.len(), 4);

    controller.shutdown().await.unwrap();
    assert!(state.lock().unwrap().starts.is_empty());
}
