// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the scheduler on a real SQLite database.
//!
//! Each test gets its own temp directory. Time is real, with the scheduler
//! windows shrunk so recordings complete within a second.

use std::sync::Arc;
use std::time::Duration;

use dvr_config::model::StorageConfig;
use dvr_core::{
    Channel, ChannelId, Clock, InputId, RecordingId, RecordingState, RecordingStore,
    ScheduledRecording, StaticChannels, SystemClock,
};
use dvr_scheduler::{DvrHandle, DvrService, SchedulerSettings};
use dvr_storage::SqliteRecordingStore;
use dvr_test_utils::MockTuner;
use tempfile::TempDir;

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        soon_window_ms: 2_000,
        wake_before_start_ms: 500,
        lead_ms: 50,
        trail_ms: 50,
        ..SchedulerSettings::default()
    }
}

async fn open_store(dir: &TempDir) -> Arc<SqliteRecordingStore> {
    let store = SqliteRecordingStore::new(StorageConfig {
        database_path: dir.path().join("dvr.db").to_string_lossy().into_owned(),
        wal_mode: true,
        change_poll_ms: 20,
    });
    store.initialize().await.unwrap();
    Arc::new(store)
}

fn channels() -> Arc<StaticChannels> {
    Arc::new(StaticChannels::new([Channel {
        id: ChannelId(1),
        input_id: InputId::new("hw0"),
        display_number: "1".into(),
        name: "One".into(),
    }]))
}

async fn start(store: Arc<SqliteRecordingStore>) -> DvrService {
    store
        .watch_external_writes(Duration::from_millis(20))
        .await
        .unwrap();
    let service = DvrService::builder(
        store,
        Arc::new(MockTuner::single_input("hw0", 1)),
        channels(),
    )
    .settings(settings())
    .spawn();
    tokio::time::timeout(Duration::from_secs(5), service.handle().initialized())
        .await
        .expect("initial load timed out")
        .unwrap();
    service
}

async fn wait_for_state(
    handle: &DvrHandle,
    id: RecordingId,
    state: RecordingState,
) -> ScheduledRecording {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(recording) = handle.scheduled_recording(id).await.unwrap()
            && recording.state() == state
        {
            return recording;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "recording {id} never reached {state}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn recording_lifecycle_is_persisted() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let service = start(store.clone()).await;
    let handle = service.handle();

    let now = SystemClock.now_ms();
    let recording = handle
        .add_schedule_for_channel(ChannelId(1), now + 200, now + 600)
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&handle, recording.id(), RecordingState::Finished).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.query_recorded_programs().await.unwrap().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "recorded program never stored");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stored = store.query_recordings().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].state(), RecordingState::Finished);

    let programs = store.query_recorded_programs().await.unwrap();
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].channel_id, ChannelId(1));
    assert_eq!(programs[0].input_id, InputId::new("hw0"));
    assert!(programs[0].data_uri.starts_with("mock://hw0/"));

    service.shutdown().await;
}

#[tokio::test]
async fn schedule_survives_restart() {
    let dir = TempDir::new().unwrap();
    let now = SystemClock.now_ms();

    let first = start(open_store(&dir).await).await;
    let added = first
        .handle()
        .add_schedule_for_channel(ChannelId(1), now + 3_600_000, now + 7_200_000)
        .await
        .unwrap()
        .unwrap();
    first.shutdown().await;

    let second = start(open_store(&dir).await).await;
    let reloaded = second.handle().all_scheduled_recordings().await.unwrap();
    assert_eq!(reloaded, vec![added.clone()]);
    assert_eq!(
        second
            .handle()
            .next_scheduled_start_time_after(now)
            .await
            .unwrap(),
        Some(added.start_time_ms())
    );
    second.shutdown().await;
}

#[tokio::test]
async fn interrupted_recording_is_failed_in_the_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let now = SystemClock.now_ms();
    let interrupted =
        ScheduledRecording::builder_for_time_range(ChannelId(1), now - 60_000, now + 60_000)
            .state(RecordingState::InProgress)
            .build()
            .unwrap();
    let id = store.insert_recording(&interrupted).await.unwrap();

    let service = start(store.clone()).await;
    wait_for_state(&service.handle(), id, RecordingState::Failed).await;

    let stored = store.query_recordings().await.unwrap();
    assert_eq!(stored[0].state(), RecordingState::Failed);
    service.shutdown().await;
}

#[tokio::test]
async fn row_written_by_another_process_is_recorded() {
    let dir = TempDir::new().unwrap();
    let service = start(open_store(&dir).await).await;
    let handle = service.handle();

    // What `dvr schedule` does: its own connection, a plain insert.
    let cli = open_store(&dir).await;
    let now = SystemClock.now_ms();
    let id = cli
        .insert_recording(
            &ScheduledRecording::builder_for_time_range(ChannelId(1), now + 300, now + 700)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    wait_for_state(&handle, id, RecordingState::Finished).await;
    let stored = cli.query_recording(id).await.unwrap().unwrap();
    assert_eq!(stored.state(), RecordingState::Finished);
    service.shutdown().await;
}

#[tokio::test]
async fn removal_deletes_the_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let service = start(store.clone()).await;
    let handle = service.handle();

    let now = SystemClock.now_ms();
    let recording = handle
        .add_schedule_for_channel(ChannelId(1), now + 3_600_000, now + 7_200_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.query_recordings().await.unwrap().len(), 1);

    handle.remove_scheduled_recording(recording).await.unwrap();
    assert!(store.query_recordings().await.unwrap().is_empty());
    assert!(handle.all_scheduled_recordings().await.unwrap().is_empty());
    service.shutdown().await;
}
