// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store for scheduled recordings and recorded programs.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::DvrError;
use crate::recording::ScheduledRecording;
use crate::types::{RecordedProgram, RecordedProgramId, RecordingId};

/// A change made to the store by something other than the write methods of
/// [`RecordingStore`], for example a media scanner registering new files or
/// another process scheduling a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// One scheduled recording changed (`Some`) or an unknown set of them (`None`).
    ScheduledRecordings(Option<RecordingId>),
    /// One recorded program changed (`Some`) or an unknown set of them (`None`).
    RecordedPrograms(Option<RecordedProgramId>),
}

/// Asynchronous store backing the in-memory data manager.
///
/// Write methods return the number of affected rows so callers can tell a
/// no-op from a real change.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Inserts a new record and returns the id the store assigned.
    async fn insert_recording(&self, recording: &ScheduledRecording)
    -> Result<RecordingId, DvrError>;

    async fn update_recording(&self, recording: &ScheduledRecording) -> Result<usize, DvrError>;

    async fn delete_recording(&self, id: RecordingId) -> Result<usize, DvrError>;

    async fn query_recordings(&self) -> Result<Vec<ScheduledRecording>, DvrError>;

    async fn query_recording(&self, id: RecordingId)
    -> Result<Option<ScheduledRecording>, DvrError>;

    async fn insert_recorded_program(
        &self,
        program: &RecordedProgram,
    ) -> Result<RecordedProgramId, DvrError>;

    async fn delete_recorded_program(&self, id: RecordedProgramId) -> Result<usize, DvrError>;

    async fn query_recorded_programs(&self) -> Result<Vec<RecordedProgram>, DvrError>;

    async fn query_recorded_program(
        &self,
        id: RecordedProgramId,
    ) -> Result<Option<RecordedProgram>, DvrError>;

    /// Subscribes to externally made changes.
    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange>;
}
