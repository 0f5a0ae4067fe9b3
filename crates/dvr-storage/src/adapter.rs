// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`RecordingStore`].

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OnceCell, broadcast};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use dvr_config::model::StorageConfig;
use dvr_core::{
    DvrError, RecordedProgram, RecordedProgramId, RecordingId, RecordingStore, ScheduledRecording,
    StoreChange,
};

use crate::database::Database;
use crate::queries;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// SQLite-backed recording store.
///
/// The database is opened lazily by [`SqliteRecordingStore::initialize`].
pub struct SqliteRecordingStore {
    config: StorageConfig,
    db: OnceCell<Database>,
    changes: broadcast::Sender<StoreChange>,
    watcher: OnceLock<AbortHandle>,
}

impl SqliteRecordingStore {
    /// The connection is not opened until [`initialize`](Self::initialize).
    pub fn new(config: StorageConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            config,
            db: OnceCell::new(),
            changes,
            watcher: OnceLock::new(),
        }
    }

    /// Wraps an already opened database.
    pub fn with_database(config: StorageConfig, db: Database) -> Self {
        let store = Self::new(config);
        // A fresh OnceCell is always empty.
        let _ = store.db.set(db);
        store
    }

    /// Opens the database file and applies migrations. Idempotent.
    pub async fn initialize(&self) -> Result<(), DvrError> {
        self.db
            .get_or_try_init(|| Database::open(&self.config.database_path, self.config.wal_mode))
            .await?;
        debug!(path = %self.config.database_path, "recording store initialized");
        Ok(())
    }

    /// Announces a change made outside the write methods, such as a media
    /// file registered by another component.
    pub fn notify_external_change(&self, change: StoreChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    /// Announces commits made through other connections to the same file,
    /// checking `PRAGMA data_version` every `period`. Writes through this
    /// store never trigger it. Calling it again is a no-op.
    pub async fn watch_external_writes(&self, period: Duration) -> Result<(), DvrError> {
        if self.watcher.get().is_some() {
            return Ok(());
        }
        let db = self.db()?.clone();
        let baseline = db.data_version().await?;
        let task = tokio::spawn(poll_data_version(
            db,
            self.changes.clone(),
            period,
            baseline,
        ));
        if let Err(duplicate) = self.watcher.set(task.abort_handle()) {
            duplicate.abort();
        }
        info!(?period, "watching database for external writes");
        Ok(())
    }

    fn db(&self) -> Result<&Database, DvrError> {
        self.db.get().ok_or_else(|| DvrError::Storage {
            source: "recording store not initialized -- call initialize() first".into(),
        })
    }
}

impl Drop for SqliteRecordingStore {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get() {
            watcher.abort();
        }
    }
}

async fn poll_data_version(
    db: Database,
    changes: broadcast::Sender<StoreChange>,
    period: Duration,
    mut seen: i64,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await;
    loop {
        tick.tick().await;
        let version = match db.data_version().await {
            Ok(version) => version,
            Err(e) => {
                debug!(error = %e, "database gone, external write watch stopped");
                return;
            }
        };
        if version != seen {
            debug!(version, "database changed by another connection");
            seen = version;
            // No receivers is fine.
            let _ = changes.send(StoreChange::ScheduledRecordings(None));
            let _ = changes.send(StoreChange::RecordedPrograms(None));
        }
    }
}

#[async_trait]
impl RecordingStore for SqliteRecordingStore {
    async fn insert_recording(
        &self,
        recording: &ScheduledRecording,
    ) -> Result<RecordingId, DvrError> {
        queries::recordings::insert_recording(self.db()?, recording).await
    }

    async fn update_recording(&self, recording: &ScheduledRecording) -> Result<usize, DvrError> {
        queries::recordings::update_recording(self.db()?, recording).await
    }

    async fn delete_recording(&self, id: RecordingId) -> Result<usize, DvrError> {
        queries::recordings::delete_recording(self.db()?, id).await
    }

    async fn query_recordings(&self) -> Result<Vec<ScheduledRecording>, DvrError> {
        queries::recordings::list_recordings(self.db()?).await
    }

    async fn query_recording(
        &self,
        id: RecordingId,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        queries::recordings::get_recording(self.db()?, id).await
    }

    async fn insert_recorded_program(
        &self,
        program: &RecordedProgram,
    ) -> Result<RecordedProgramId, DvrError> {
        queries::recorded_programs::insert_recorded_program(self.db()?, program).await
    }

    async fn delete_recorded_program(&self, id: RecordedProgramId) -> Result<usize, DvrError> {
        queries::recorded_programs::delete_recorded_program(self.db()?, id).await
    }

    async fn query_recorded_programs(&self) -> Result<Vec<RecordedProgram>, DvrError> {
        queries::recorded_programs::list_recorded_programs(self.db()?).await
    }

    async fn query_recorded_program(
        &self,
        id: RecordedProgramId,
    ) -> Result<Option<RecordedProgram>, DvrError> {
        queries::recorded_programs::get_recorded_program(self.db()?, id).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
