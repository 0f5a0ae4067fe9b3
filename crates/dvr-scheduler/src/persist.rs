// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single writer between the in-memory index and the persistent store.
//!
//! Requests are executed strictly in submission order. Successful writes
//! come back to the control loop as [`PersistAck`] messages; failed writes
//! are logged and produce no acknowledgement, so memory stays unchanged.

use std::sync::Arc;

use dvr_core::{
    RecordedProgram, RecordedProgramId, RecordingId, RecordingStore, ScheduledRecording,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::control::ControlMsg;

/// Optional caller waiting for the outcome. `None` is delivered when the
/// write failed or was dropped.
pub(crate) type Reply<T> = Option<oneshot::Sender<Option<T>>>;

pub(crate) fn respond<T>(reply: Reply<T>, value: Option<T>) {
    if let Some(tx) = reply {
        let _ = tx.send(value);
    }
}

pub(crate) enum PersistRequest {
    LoadAll,
    InsertRecording(ScheduledRecording, Reply<ScheduledRecording>),
    UpdateRecording(ScheduledRecording, Reply<ScheduledRecording>),
    DeleteRecording(ScheduledRecording, Reply<ScheduledRecording>),
    InsertRecordedProgram(RecordedProgram, Reply<RecordedProgram>),
    DeleteRecordedProgram(RecordedProgram, Reply<RecordedProgram>),
    /// Re-read one scheduled recording, or all of them for `None`.
    RefreshRecordings(Option<RecordingId>),
    /// Re-read one recorded program, or all of them for `None`.
    RefreshRecordedPrograms(Option<RecordedProgramId>),
}

pub(crate) enum PersistAck {
    RecordingsLoaded(Vec<ScheduledRecording>),
    RecordedProgramsLoaded(Vec<RecordedProgram>),
    RecordingInserted(ScheduledRecording, Reply<ScheduledRecording>),
    RecordingUpdated(ScheduledRecording, Reply<ScheduledRecording>),
    RecordingDeleted(ScheduledRecording, Reply<ScheduledRecording>),
    RecordedProgramInserted(RecordedProgram, Reply<RecordedProgram>),
    RecordedProgramDeleted(RecordedProgram, Reply<RecordedProgram>),
    RecordingRefreshed {
        id: RecordingId,
        recording: Option<ScheduledRecording>,
    },
    RecordingsReloaded(Vec<ScheduledRecording>),
    RecordedProgramRefreshed {
        id: RecordedProgramId,
        program: Option<RecordedProgram>,
    },
    RecordedProgramsReloaded(Vec<RecordedProgram>),
}

pub(crate) struct PersistWorker {
    store: Arc<dyn RecordingStore>,
    rx: mpsc::UnboundedReceiver<PersistRequest>,
    control: mpsc::UnboundedSender<ControlMsg>,
}

impl PersistWorker {
    pub(crate) fn new(
        store: Arc<dyn RecordingStore>,
        rx: mpsc::UnboundedReceiver<PersistRequest>,
        control: mpsc::UnboundedSender<ControlMsg>,
    ) -> Self {
        Self { store, rx, control }
    }

    /// Runs until every request sender is gone.
    pub(crate) async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request).await;
        }
        debug!("persist worker stopped");
    }

    fn ack(&self, ack: PersistAck) {
        if self.control.send(ControlMsg::Persisted(ack)).is_err() {
            debug!("control loop gone, dropping acknowledgement");
        }
    }

    async fn handle(&self, request: PersistRequest) {
        match request {
            PersistRequest::LoadAll => {
                match self.store.query_recordings().await {
                    Ok(recordings) => self.ack(PersistAck::RecordingsLoaded(recordings)),
                    Err(e) => error!(error = %e, "failed to load scheduled recordings"),
                }
                match self.store.query_recorded_programs().await {
                    Ok(programs) => self.ack(PersistAck::RecordedProgramsLoaded(programs)),
                    Err(e) => error!(error = %e, "failed to load recorded programs"),
                }
            }
            PersistRequest::InsertRecording(recording, reply) => {
                match self.store.insert_recording(&recording).await {
                    Ok(id) => self.ack(PersistAck::RecordingInserted(recording.with_id(id), reply)),
                    Err(e) => {
                        error!(error = %e, channel_id = %recording.channel_id(), "failed to insert scheduled recording");
                        respond(reply, None);
                    }
                }
            }
            PersistRequest::UpdateRecording(recording, reply) => {
                match self.store.update_recording(&recording).await {
                    Ok(0) => {
                        warn!(recording_id = %recording.id(), "update matched no stored recording");
                        respond(reply, None);
                    }
                    Ok(_) => self.ack(PersistAck::RecordingUpdated(recording, reply)),
                    Err(e) => {
                        error!(error = %e, recording_id = %recording.id(), "failed to update scheduled recording");
                        respond(reply, None);
                    }
                }
            }
            PersistRequest::DeleteRecording(recording, reply) => {
                match self.store.delete_recording(recording.id()).await {
                    Ok(affected) => {
                        if affected == 0 {
                            debug!(recording_id = %recording.id(), "recording already absent from store");
                        }
                        self.ack(PersistAck::RecordingDeleted(recording, reply));
                    }
                    Err(e) => {
                        error!(error = %e, recording_id = %recording.id(), "failed to delete scheduled recording");
                        respond(reply, None);
                    }
                }
            }
            PersistRequest::InsertRecordedProgram(program, reply) => {
                match self.store.insert_recorded_program(&program).await {
                    Ok(id) => {
                        self.ack(PersistAck::RecordedProgramInserted(program.with_id(id), reply))
                    }
                    Err(e) => {
                        error!(error = %e, data_uri = %program.data_uri, "failed to insert recorded program");
                        respond(reply, None);
                    }
                }
            }
            PersistRequest::DeleteRecordedProgram(program, reply) => {
                match self.store.delete_recorded_program(program.id).await {
                    Ok(_) => self.ack(PersistAck::RecordedProgramDeleted(program, reply)),
                    Err(e) => {
                        error!(error = %e, recorded_program_id = %program.id, "failed to delete recorded program");
                        respond(reply, None);
                    }
                }
            }
            PersistRequest::RefreshRecordings(Some(id)) => {
                match self.store.query_recording(id).await {
                    Ok(recording) => self.ack(PersistAck::RecordingRefreshed { id, recording }),
                    Err(e) => error!(error = %e, recording_id = %id, "failed to re-query scheduled recording"),
                }
            }
            PersistRequest::RefreshRecordings(None) => {
                match self.store.query_recordings().await {
                    Ok(recordings) => self.ack(PersistAck::RecordingsReloaded(recordings)),
                    Err(e) => error!(error = %e, "failed to reload scheduled recordings"),
                }
            }
            PersistRequest::RefreshRecordedPrograms(Some(id)) => {
                match self.store.query_recorded_program(id).await {
                    Ok(program) => self.ack(PersistAck::RecordedProgramRefreshed { id, program }),
                    Err(e) => error!(error = %e, recorded_program_id = %id, "failed to re-query recorded program"),
                }
            }
            PersistRequest::RefreshRecordedPrograms(None) => {
                match self.store.query_recorded_programs().await {
                    Ok(programs) => self.ack(PersistAck::RecordedProgramsReloaded(programs)),
                    Err(e) => error!(error = %e, "failed to reload recorded programs"),
                }
            }
        }
    }
}
