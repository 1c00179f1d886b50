//! Progress persistence against the SQLite store and a check-then-act store.

mod common;

use bridge_traits::SystemClock;
use bridge_traits::OutputEvent;
use common::*;
use core_library::db::create_test_pool;
use core_library::repositories::{ProgressRepository, SqliteProgressRepository};
use core_playback::progress::ProgressStore;
use core_playback::{ActiveBook, SecureAudioSession};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_repeated_saves_leave_one_row() {
    let repo = Arc::new(SqliteProgressRepository::new(create_test_pool().await.unwrap()));
    let store = ProgressStore::new(repo.clone(), Arc::new(SystemClock));

    for _ in 0..5 {
        store.save("u-1", "b-1", 73.0, Some(300.0)).await.unwrap();
    }

    let rows = repo.recent_for_user("u-1", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].current_position, 73.0);
}

#[tokio::test]
async fn test_racing_saves_on_check_then_act_store_insert_once() {
    let repo = CountingProgressRepo::new();
    let store = Arc::new(ProgressStore::new(repo.clone(), Arc::new(SystemClock)));

    let mut saves = JoinSet::new();
    for i in 0..10 {
        let store = store.clone();
        saves.spawn(async move { store.save("u-1", "b-1", i as f64, None).await });
    }
    while let Some(result) = saves.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(repo.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(repo.updates.load(Ordering::SeqCst), 9);
    assert!(repo.position("u-1", "b-1").is_some());
}

#[tokio::test]
async fn test_saved_progress_round_trips_into_a_new_session() {
    let pool = create_test_pool().await.unwrap();
    let first = ProgressStore::new(
        Arc::new(SqliteProgressRepository::new(pool.clone())),
        Arc::new(SystemClock),
    );
    first.save("u-1", "b-1", 125.0, Some(300.0)).await.unwrap();

    let repo = Arc::new(SqliteProgressRepository::new(pool));
    let fresh = ProgressStore::new(repo.clone(), Arc::new(SystemClock));
    let loaded = fresh.load("u-1", "b-1").await.unwrap().unwrap();
    assert_eq!(loaded.current_position, 125.0);
    assert_eq!(loaded.duration, Some(300.0));

    let harness = HarnessBuilder::new()
        .signed_in("u-1")
        .progress_repository(repo)
        .build();
    let output = FakeOutput::new();
    let session = SecureAudioSession::open(
        harness.ctx.clone(),
        ActiveBook::new("b-1", "Emma", "Jane Austen", "emma.mp3"),
        output.clone(),
    )
    .await
    .unwrap();

    output.emit(OutputEvent::MetadataLoaded { duration: 300.0 });
    let mut rx = session.subscribe();
    wait_for(&mut rx, |s| s.current_time == 125.0).await;
    assert!(output.calls().contains(&OutputCall::SetPosition(125.0)));
}
