// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory recording store for deterministic testing.
//!
//! `MemoryStore` implements `RecordingStore` with switchable write and load
//! failures, and lets tests simulate changes made to either table by
//! something other than the scheduler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use dvr_core::{
    DvrError, RecordedProgram, RecordedProgramId, RecordingId, RecordingStore,
    ScheduledRecording, StoreChange,
};

#[derive(Default)]
struct Tables {
    recordings: BTreeMap<RecordingId, ScheduledRecording>,
    recorded_programs: BTreeMap<RecordedProgramId, RecordedProgram>,
    next_recording_id: i64,
    next_recorded_program_id: i64,
}

impl Tables {
    fn assign_recording_id(&mut self) -> RecordingId {
        self.next_recording_id += 1;
        RecordingId(self.next_recording_id)
    }

    fn assign_recorded_program_id(&mut self) -> RecordedProgramId {
        self.next_recorded_program_id += 1;
        RecordedProgramId(self.next_recorded_program_id)
    }
}

/// Recording store backed by two ordered maps.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<StoreChange>,
    fail_writes: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
            fail_writes: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    /// Seeds the store. Records without an id get the next free one.
    pub fn with_recordings(recordings: Vec<ScheduledRecording>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables();
            for recording in recordings {
                let recording = if recording.id().is_set() {
                    tables.next_recording_id = tables.next_recording_id.max(recording.id().0);
                    recording
                } else {
                    let id = tables.assign_recording_id();
                    recording.with_id(id)
                };
                tables.recordings.insert(recording.id(), recording);
            }
        }
        store
    }

    /// Makes every subsequent insert, update and delete fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the bulk queries fail.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn recordings(&self) -> Vec<ScheduledRecording> {
        self.tables().recordings.values().cloned().collect()
    }

    pub fn recording(&self, id: RecordingId) -> Option<ScheduledRecording> {
        self.tables().recordings.get(&id).cloned()
    }

    pub fn recorded_programs(&self) -> Vec<RecordedProgram> {
        self.tables().recorded_programs.values().cloned().collect()
    }

    /// Inserts a scheduled recording behind the scheduler's back and
    /// announces it, the way another process writing the database would.
    pub fn inject_recording(&self, recording: ScheduledRecording) -> RecordingId {
        let id = {
            let mut tables = self.tables();
            let id = tables.assign_recording_id();
            tables.recordings.insert(id, recording.with_id(id));
            id
        };
        let _ = self.changes.send(StoreChange::ScheduledRecordings(Some(id)));
        id
    }

    /// Deletes a scheduled recording behind the scheduler's back and
    /// announces an unspecific change.
    pub fn purge_recording(&self, id: RecordingId) -> bool {
        let removed = self.tables().recordings.remove(&id).is_some();
        let _ = self.changes.send(StoreChange::ScheduledRecordings(None));
        removed
    }

    /// Inserts a recorded program behind the scheduler's back and
    /// announces it, the way a media scanner would.
    pub fn inject_recorded_program(&self, program: RecordedProgram) -> RecordedProgramId {
        let id = {
            let mut tables = self.tables();
            let id = tables.assign_recorded_program_id();
            tables.recorded_programs.insert(id, program.with_id(id));
            id
        };
        let _ = self.changes.send(StoreChange::RecordedPrograms(Some(id)));
        id
    }

    /// Deletes a recorded program behind the scheduler's back and
    /// announces an unspecific change.
    pub fn purge_recorded_program(&self, id: RecordedProgramId) -> bool {
        let removed = self.tables().recorded_programs.remove(&id).is_some();
        let _ = self.changes.send(StoreChange::RecordedPrograms(None));
        removed
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_write(&self) -> Result<(), DvrError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DvrError::storage(std::io::Error::other("injected write failure")));
        }
        Ok(())
    }

    fn check_load(&self) -> Result<(), DvrError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(DvrError::storage(std::io::Error::other("injected load failure")));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordingStore for MemoryStore {
    async fn insert_recording(
        &self,
        recording: &ScheduledRecording,
    ) -> Result<RecordingId, DvrError> {
        self.check_write()?;
        let mut tables = self.tables();
        let id = tables.assign_recording_id();
        tables.recordings.insert(id, recording.with_id(id));
        Ok(id)
    }

    async fn update_recording(&self, recording: &ScheduledRecording) -> Result<usize, DvrError> {
        self.check_write()?;
        let mut tables = self.tables();
        match tables.recordings.get_mut(&recording.id()) {
            Some(stored) => {
                *stored = recording.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_recording(&self, id: RecordingId) -> Result<usize, DvrError> {
        self.check_write()?;
        Ok(usize::from(self.tables().recordings.remove(&id).is_some()))
    }

    async fn query_recordings(&self) -> Result<Vec<ScheduledRecording>, DvrError> {
        self.check_load()?;
        Ok(self.recordings())
    }

    async fn query_recording(
        &self,
        id: RecordingId,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        Ok(self.recording(id))
    }

    async fn insert_recorded_program(
        &self,
        program: &RecordedProgram,
    ) -> Result<RecordedProgramId, DvrError> {
        self.check_write()?;
        let mut tables = self.tables();
        let id = tables.assign_recorded_program_id();
        tables
            .recorded_programs
            .insert(id, program.clone().with_id(id));
        Ok(id)
    }

    async fn delete_recorded_program(&self, id: RecordedProgramId) -> Result<usize, DvrError> {
        self.check_write()?;
        Ok(usize::from(
            self.tables().recorded_programs.remove(&id).is_some(),
        ))
    }

    async fn query_recorded_programs(&self) -> Result<Vec<RecordedProgram>, DvrError> {
        self.check_load()?;
        Ok(self.recorded_programs())
    }

    async fn query_recorded_program(
        &self,
        id: RecordedProgramId,
    ) -> Result<Option<RecordedProgram>, DvrError> {
        Ok(self.tables().recorded_programs.get(&id).cloned())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::{ChannelId, InputId};

    fn timed(start: i64, end: i64) -> ScheduledRecording {
        ScheduledRecording::builder_for_time_range(ChannelId(1), start, end)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn assigns_ids_and_counts_rows() {
        let store = MemoryStore::new();
        let id = store.insert_recording(&timed(0, 10)).await.unwrap();
        assert_eq!(id, RecordingId(1));

        let stored = store.recording(id).unwrap();
        assert_eq!(store.update_recording(&stored).await.unwrap(), 1);
        assert_eq!(store.delete_recording(id).await.unwrap(), 1);
        assert_eq!(store.delete_recording(id).await.unwrap(), 0);
        assert_eq!(store.update_recording(&stored).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn seeded_ids_are_not_reused() {
        let store = MemoryStore::with_recordings(vec![timed(0, 10).with_id(RecordingId(5))]);
        let id = store.insert_recording(&timed(20, 30)).await.unwrap();
        assert_eq!(id, RecordingId(6));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_storage_errors() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.insert_recording(&timed(0, 10)).await.unwrap_err();
        assert!(matches!(err, DvrError::Storage { .. }));
        store.fail_loads(true);
        assert!(store.query_recordings().await.is_err());
    }

    #[tokio::test]
    async fn injection_broadcasts_change() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe_changes();
        let id = store.inject_recorded_program(RecordedProgram {
            id: RecordedProgramId::UNSET,
            input_id: InputId::new("hw0"),
            channel_id: ChannelId(1),
            program_id: None,
            start_time_ms: 0,
            end_time_ms: 10,
            data_uri: "file:///rec/1.ts".into(),
            size_bytes: 3,
        });
        assert_eq!(
            changes.recv().await.unwrap(),
            StoreChange::RecordedPrograms(Some(id))
        );
        assert_eq!(store.recorded_programs()[0].id, id);
    }

    #[tokio::test]
    async fn recording_injection_and_purge_broadcast_changes() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe_changes();
        let id = store.inject_recording(timed(0, 10));
        assert_eq!(
            changes.recv().await.unwrap(),
            StoreChange::ScheduledRecordings(Some(id))
        );
        assert_eq!(store.query_recording(id).await.unwrap(), Some(timed(0, 10).with_id(id)));

        assert!(store.purge_recording(id));
        assert_eq!(
            changes.recv().await.unwrap(),
            StoreChange::ScheduledRecordings(None)
        );
        assert!(store.query_recording(id).await.unwrap().is_none());
    }
}
