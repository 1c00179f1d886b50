//! Integration tests for the application-wide playback session.

mod common;

use bridge_traits::{OutputEvent, PlayError};
use common::*;
use core_playback::{
    ActiveBook, GlobalPlaybackSession, PlaybackError, PlaybackSnapshot, SecureAudioSession,
};

fn emma() -> ActiveBook {
    ActiveBook::new("b-1", "Emma", "Jane Austen", "austen/emma.mp3")
        .with_cover_url("https://img.example/emma.jpg")
}

#[tokio::test]
async fn test_start_primes_output_without_playing() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();

    global.start(emma()).unwrap();

    let snapshot = global.snapshot();
    assert_eq!(snapshot.active_book, Some(emma()));
    assert!(!snapshot.is_playing);
    assert_eq!(
        output.calls(),
        vec![
            OutputCall::SetSource("https://storage.example/audiobooks/austen/emma.mp3".into()),
            OutputCall::Load
        ]
    );
    // No reachability probe on the shared path.
    assert!(harness.http.requests().is_empty());
}

#[tokio::test]
async fn test_starting_the_active_book_again_keeps_the_source() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();

    global.start(emma()).unwrap();
    output.emit(OutputEvent::TimeUpdate { position: 30.0 });
    let mut rx = global.subscribe();
    wait_for(&mut rx, |s| s.current_time == 30.0).await;

    global.start(emma()).unwrap();
    assert_eq!(output.count(&OutputCall::Load), 1);
    assert_eq!(global.snapshot().current_time, 30.0);
}

#[tokio::test]
async fn test_restarting_with_changed_details_replaces_the_book() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();

    global.start(emma()).unwrap();
    output.emit(OutputEvent::TimeUpdate { position: 30.0 });
    let mut rx = global.subscribe();
    wait_for(&mut rx, |s| s.current_time == 30.0).await;

    let new_cover = emma().with_cover_url("https://img.example/emma-v2.jpg");
    global.start(new_cover.clone()).unwrap();
    assert_eq!(global.snapshot().active_book, Some(new_cover));
    assert_eq!(global.snapshot().current_time, 30.0);
    assert_eq!(output.count(&OutputCall::Load), 1);

    let remastered = ActiveBook::new("b-1", "Emma", "Jane Austen", "austen/emma-remastered.mp3");
    global.start(remastered.clone()).unwrap();
    assert_eq!(global.snapshot().active_book, Some(remastered));
    assert_eq!(global.snapshot().current_time, 0.0);
    assert_eq!(output.count(&OutputCall::Load), 2);
    assert_eq!(
        output.calls().iter().rev().nth(1),
        Some(&OutputCall::SetSource(
            "https://storage.example/audiobooks/austen/emma-remastered.mp3".into()
        ))
    );
}

#[tokio::test]
async fn test_book_without_audio_is_rejected() {
    let harness = HarnessBuilder::new().build();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), FakeOutput::new()).unwrap();

    let result = global.start(ActiveBook::new("b-2", "Notes", "Anon", ""));
    assert!(matches!(result, Err(PlaybackError::SourceUnavailable(id)) if id == "b-2"));
    assert_eq!(global.snapshot(), PlaybackSnapshot::default());
}

#[tokio::test]
async fn test_output_events_drive_state() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();
    global.start(emma()).unwrap();
    let mut rx = global.subscribe();

    output.emit(OutputEvent::MetadataLoaded { duration: 3600.0 });
    output.emit(OutputEvent::Played);
    output.emit(OutputEvent::TimeUpdate { position: 12.0 });
    let snapshot = wait_for(&mut rx, |s| s.current_time == 12.0).await;
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.duration, 3600.0);

    output.emit(OutputEvent::Ended);
    wait_for(&mut rx, |s| !s.is_playing).await;
}

#[tokio::test]
async fn test_toggle_plays_and_pauses() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();
    global.start(emma()).unwrap();

    global.toggle().await;
    assert!(global.snapshot().is_playing);

    global.toggle().await;
    assert!(!global.snapshot().is_playing);
    assert_eq!(output.count(&OutputCall::Play), 1);
    assert_eq!(output.count(&OutputCall::Pause), 1);
}

#[tokio::test]
async fn test_toggle_without_book_does_nothing() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();

    global.toggle().await;

    assert!(output.calls().is_empty());
    assert!(!global.snapshot().is_playing);
}

#[tokio::test]
async fn test_rejected_play_is_swallowed() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();
    global.start(emma()).unwrap();

    output.fail_next_play(PlayError::NotAllowed("no gesture".into()));
    global.toggle().await;

    assert!(!global.snapshot().is_playing);
    assert_eq!(global.snapshot().active_book, Some(emma()));
}

#[tokio::test]
async fn test_stop_clears_everything() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();
    global.start(emma()).unwrap();
    global.set_mini_player_visible(true);
    global.toggle().await;
    output.emit(OutputEvent::TimeUpdate { position: 40.0 });
    let mut rx = global.subscribe();
    wait_for(&mut rx, |s| s.current_time == 40.0).await;

    global.stop();

    assert_eq!(global.snapshot(), PlaybackSnapshot::default());
    let calls = output.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[OutputCall::Pause, OutputCall::SetPosition(0.0)]
    );

    // Late events from the old source are ignored.
    output.emit(OutputEvent::TimeUpdate { position: 41.0 });
    output.emit(OutputEvent::Played);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(global.snapshot(), PlaybackSnapshot::default());
}

#[tokio::test]
async fn test_mini_player_only_shows_with_active_book() {
    let harness = HarnessBuilder::new().build();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), FakeOutput::new()).unwrap();

    global.set_mini_player_visible(true);
    assert!(!global.snapshot().mini_player_visible);

    global.start(emma()).unwrap();
    global.set_mini_player_visible(true);
    assert!(global.snapshot().mini_player_visible);

    global.set_mini_player_visible(false);
    assert!(!global.snapshot().mini_player_visible);
}

#[tokio::test]
async fn test_seek_mirrors_position() {
    let harness = HarnessBuilder::new().build();
    let output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), output.clone()).unwrap();
    global.start(emma()).unwrap();

    global.seek_to(95.5);

    assert_eq!(global.snapshot().current_time, 95.5);
    assert_eq!(output.calls().last(), Some(&OutputCall::SetPosition(95.5)));
}

#[tokio::test]
async fn test_full_player_does_not_touch_the_shared_output() {
    let harness = HarnessBuilder::new().build();
    let shared_output = FakeOutput::new();
    let global = GlobalPlaybackSession::new(harness.ctx.clone(), shared_output.clone()).unwrap();
    global.start(emma()).unwrap();
    let primed = shared_output.calls();

    let screen_output = FakeOutput::new();
    let session = SecureAudioSession::open(harness.ctx.clone(), emma(), screen_output.clone())
        .await
        .unwrap();
    session.toggle_play().await;
    screen_output.emit(OutputEvent::TimeUpdate { position: 9.0 });
    let mut local = session.subscribe();
    wait_for(&mut local, |s| s.current_time == 9.0).await;
    session.seek_to(60.0).await;
    session.toggle_play().await;
    session.close().await;

    assert_eq!(screen_output.count(&OutputCall::Play), 1);
    assert_eq!(shared_output.calls(), primed);
    let snapshot = global.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.current_time, 0.0);
    assert_eq!(snapshot.active_book, Some(emma()));
}
