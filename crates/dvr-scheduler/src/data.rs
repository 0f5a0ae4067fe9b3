// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory index of scheduled recordings and recorded programs.
//!
//! [`DvrDataManager`] lives on the control loop. Reads are synchronous and
//! served from memory. Mutations are forwarded to the persist worker and
//! only take effect, together with listener notification, once the store
//! acknowledges them through [`DvrDataManager::apply`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dvr_core::{
    Clock, Period, ProgramId, RecordedProgram, RecordedProgramId, RecordingId, RecordingState,
    ScheduledRecording,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::listener::{DataEvent, ListenerRegistry};
use crate::persist::{PersistAck, PersistRequest, Reply, respond};

pub struct DvrDataManager {
    clock: Arc<dyn Clock>,
    recordings: HashMap<RecordingId, ScheduledRecording>,
    program_index: HashMap<ProgramId, RecordingId>,
    /// `(start, id)` of every `NOT_STARTED` record, kept in step with
    /// `recordings` by `index` and `unindex`.
    pending_starts: BTreeSet<(i64, RecordingId)>,
    recorded_programs: HashMap<RecordedProgramId, RecordedProgram>,
    recordings_loaded: bool,
    recorded_programs_loaded: bool,
    persist: mpsc::UnboundedSender<PersistRequest>,
    pub(crate) listeners: ListenerRegistry,
}

impl DvrDataManager {
    pub(crate) fn new(clock: Arc<dyn Clock>, persist: mpsc::UnboundedSender<PersistRequest>) -> Self {
        Self {
            clock,
            recordings: HashMap::new(),
            program_index: HashMap::new(),
            pending_starts: BTreeSet::new(),
            recorded_programs: HashMap::new(),
            recordings_loaded: false,
            recorded_programs_loaded: false,
            persist,
            listeners: ListenerRegistry::default(),
        }
    }

    /// Queues the initial load of both tables.
    pub(crate) fn start_loading(&self) {
        self.submit(PersistRequest::LoadAll);
    }

    /// True once both initial loads have completed.
    pub fn is_initialized(&self) -> bool {
        self.recordings_loaded && self.recorded_programs_loaded
    }

    pub fn all_scheduled_recordings(&self) -> Vec<ScheduledRecording> {
        if !self.is_initialized() {
            return Vec::new();
        }
        self.recordings.values().cloned().collect()
    }

    pub fn recorded_programs(&self) -> Vec<RecordedProgram> {
        if !self.is_initialized() {
            return Vec::new();
        }
        self.recorded_programs.values().cloned().collect()
    }

    /// `IN_PROGRESS` recordings that have not ended yet.
    pub fn started_recordings(&self) -> Vec<ScheduledRecording> {
        self.recordings_in_state(RecordingState::InProgress)
    }

    /// `NOT_STARTED` recordings that have not ended yet.
    pub fn non_started_scheduled_recordings(&self) -> Vec<ScheduledRecording> {
        self.recordings_in_state(RecordingState::NotStarted)
    }

    fn recordings_in_state(&self, state: RecordingState) -> Vec<ScheduledRecording> {
        if !self.is_initialized() {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.recordings
            .values()
            .filter(|r| r.state() == state && r.end_time_ms() > now)
            .cloned()
            .collect()
    }

    pub fn recordings_that_overlap_with(&self, period: &Period) -> Vec<ScheduledRecording> {
        if !self.is_initialized() {
            return Vec::new();
        }
        self.recordings
            .values()
            .filter(|r| r.is_overlapping(period))
            .cloned()
            .collect()
    }

    /// Smallest start time of a non-started recording strictly after
    /// `time_ms`.
    pub fn next_scheduled_start_time_after(&self, time_ms: i64) -> Option<i64> {
        if !self.is_initialized() {
            return None;
        }
        let now = self.clock.now_ms();
        let lower = (time_ms.checked_add(1)?, RecordingId(i64::MIN));
        self.pending_starts
            .range(lower..)
            .find(|(_, id)| {
                self.recordings
                    .get(id)
                    .is_some_and(|r| r.end_time_ms() > now)
            })
            .map(|(start, _)| *start)
    }

    pub fn scheduled_recording(&self, id: RecordingId) -> Option<ScheduledRecording> {
        if !self.is_initialized() {
            return None;
        }
        self.recordings.get(&id).cloned()
    }

    pub fn scheduled_recording_for_program(
        &self,
        program_id: ProgramId,
    ) -> Option<ScheduledRecording> {
        if !self.is_initialized() {
            return None;
        }
        self.program_index
            .get(&program_id)
            .and_then(|id| self.recordings.get(id))
            .cloned()
    }

    pub fn recorded_program(&self, id: RecordedProgramId) -> Option<RecordedProgram> {
        if !self.is_initialized() {
            return None;
        }
        self.recorded_programs.get(&id).cloned()
    }

    pub(crate) fn add_scheduled_recording(
        &self,
        recording: ScheduledRecording,
        reply: Reply<ScheduledRecording>,
    ) {
        self.submit_with(PersistRequest::InsertRecording(recording, reply));
    }

    pub(crate) fn update_scheduled_recording(
        &self,
        recording: ScheduledRecording,
        reply: Reply<ScheduledRecording>,
    ) {
        self.submit_with(PersistRequest::UpdateRecording(recording, reply));
    }

    pub(crate) fn remove_scheduled_recording(
        &self,
        recording: ScheduledRecording,
        reply: Reply<ScheduledRecording>,
    ) {
        self.submit_with(PersistRequest::DeleteRecording(recording, reply));
    }

    pub(crate) fn add_recorded_program(
        &self,
        program: RecordedProgram,
        reply: Reply<RecordedProgram>,
    ) {
        self.submit_with(PersistRequest::InsertRecordedProgram(program, reply));
    }

    pub(crate) fn remove_recorded_program(
        &self,
        program: RecordedProgram,
        reply: Reply<RecordedProgram>,
    ) {
        self.submit_with(PersistRequest::DeleteRecordedProgram(program, reply));
    }

    pub(crate) fn refresh_scheduled_recordings(&self, id: Option<RecordingId>) {
        self.submit(PersistRequest::RefreshRecordings(id));
    }

    pub(crate) fn refresh_recorded_programs(&self, id: Option<RecordedProgramId>) {
        self.submit(PersistRequest::RefreshRecordedPrograms(id));
    }

    fn submit(&self, request: PersistRequest) {
        if self.persist.send(request).is_err() {
            error!("persist worker gone, dropping request");
        }
    }

    /// Like [`submit`](Self::submit) but answers the caller with `None`
    /// when the worker is gone.
    fn submit_with(&self, request: PersistRequest) {
        if let Err(mpsc::error::SendError(request)) = self.persist.send(request) {
            error!("persist worker gone, dropping request");
            match request {
                PersistRequest::InsertRecording(_, reply)
                | PersistRequest::UpdateRecording(_, reply)
                | PersistRequest::DeleteRecording(_, reply) => respond(reply, None),
                PersistRequest::InsertRecordedProgram(_, reply)
                | PersistRequest::DeleteRecordedProgram(_, reply) => respond(reply, None),
                PersistRequest::LoadAll
                | PersistRequest::RefreshRecordings(_)
                | PersistRequest::RefreshRecordedPrograms(_) => {}
            }
        }
    }

    /// Applies an acknowledged write and returns the resulting events in
    /// notification order.
    pub(crate) fn apply(&mut self, ack: PersistAck) -> Vec<DataEvent> {
        let mut events = Vec::new();
        match ack {
            PersistAck::RecordingsLoaded(recordings) => {
                self.recordings.clear();
                self.program_index.clear();
                self.pending_starts.clear();
                for recording in recordings {
                    self.index(recording);
                }
                self.recordings_loaded = true;
                info!(count = self.recordings.len(), "scheduled recordings loaded");
            }
            PersistAck::RecordedProgramsLoaded(programs) => {
                self.recorded_programs = programs.into_iter().map(|p| (p.id, p)).collect();
                self.recorded_programs_loaded = true;
                info!(count = self.recorded_programs.len(), "recorded programs loaded");
            }
            PersistAck::RecordingInserted(recording, reply) => {
                self.index(recording.clone());
                debug!(recording_id = %recording.id(), "scheduled recording added");
                events.push(DataEvent::RecordingAdded(recording.clone()));
                respond(reply, Some(recording));
            }
            PersistAck::RecordingUpdated(recording, reply) => {
                if self.recordings.contains_key(&recording.id()) {
                    self.unindex(recording.id());
                    self.index(recording.clone());
                    events.push(DataEvent::RecordingStatusChanged(recording.clone()));
                    respond(reply, Some(recording));
                } else {
                    debug!(recording_id = %recording.id(), "update acknowledged for unknown recording");
                    respond(reply, None);
                }
            }
            PersistAck::RecordingDeleted(recording, reply) => {
                // Absent records still count as removed.
                let removed = self.unindex(recording.id());
                if let Some(removed) = removed.clone() {
                    events.push(DataEvent::RecordingRemoved(removed));
                }
                respond(reply, Some(removed.unwrap_or(recording)));
            }
            PersistAck::RecordedProgramInserted(program, reply) => {
                self.recorded_programs.insert(program.id, program.clone());
                events.push(DataEvent::RecordedProgramAdded(program.clone()));
                respond(reply, Some(program));
            }
            PersistAck::RecordedProgramDeleted(program, reply) => {
                let removed = self.recorded_programs.remove(&program.id);
                if let Some(removed) = removed.clone() {
                    events.push(DataEvent::RecordedProgramRemoved(removed));
                }
                respond(reply, Some(removed.unwrap_or(program)));
            }
            PersistAck::RecordingRefreshed { .. } | PersistAck::RecordingsReloaded(_)
                if !self.recordings_loaded =>
            {
                debug!("external recording change before initial load, ignored");
            }
            PersistAck::RecordingRefreshed { id, recording } => {
                events.extend(self.merge_recording(id, recording));
            }
            PersistAck::RecordingsReloaded(recordings) => {
                let mut fresh: HashMap<_, _> = recordings.into_iter().map(|r| (r.id(), r)).collect();
                let known: Vec<RecordingId> = self.recordings.keys().copied().collect();
                for id in known {
                    let recording = fresh.remove(&id);
                    events.extend(self.merge_recording(id, recording));
                }
                for (id, recording) in fresh {
                    events.extend(self.merge_recording(id, Some(recording)));
                }
            }
            PersistAck::RecordedProgramRefreshed { id, program } => {
                events.extend(self.merge_recorded_program(id, program));
            }
            PersistAck::RecordedProgramsReloaded(programs) => {
                let mut fresh: HashMap<_, _> = programs.into_iter().map(|p| (p.id, p)).collect();
                let known: Vec<RecordedProgramId> = self.recorded_programs.keys().copied().collect();
                for id in known {
                    let program = fresh.remove(&id);
                    events.extend(self.merge_recorded_program(id, program));
                }
                for (id, program) in fresh {
                    events.extend(self.merge_recorded_program(id, Some(program)));
                }
            }
        }
        events
    }

    /// Brings one record in line with the store. A changed record is
    /// reported as a status change.
    fn merge_recording(
        &mut self,
        id: RecordingId,
        recording: Option<ScheduledRecording>,
    ) -> Option<DataEvent> {
        match (self.recordings.get(&id), recording) {
            (None, Some(recording)) => {
                debug!(recording_id = %id, "scheduled recording appeared in store");
                self.index(recording.clone());
                Some(DataEvent::RecordingAdded(recording))
            }
            (Some(existing), Some(recording)) if *existing != recording => {
                self.unindex(id);
                self.index(recording.clone());
                Some(DataEvent::RecordingStatusChanged(recording))
            }
            (Some(_), Some(_)) => None,
            (Some(_), None) => {
                debug!(recording_id = %id, "scheduled recording vanished from store");
                self.unindex(id).map(DataEvent::RecordingRemoved)
            }
            (None, None) => None,
        }
    }

    fn merge_recorded_program(
        &mut self,
        id: RecordedProgramId,
        program: Option<RecordedProgram>,
    ) -> Option<DataEvent> {
        match (self.recorded_programs.get(&id), program) {
            (None, Some(program)) => {
                self.recorded_programs.insert(id, program.clone());
                Some(DataEvent::RecordedProgramAdded(program))
            }
            (Some(existing), Some(program)) if *existing != program => {
                self.recorded_programs.insert(id, program.clone());
                Some(DataEvent::RecordedProgramChanged(program))
            }
            (Some(_), Some(_)) => None,
            (Some(_), None) => self
                .recorded_programs
                .remove(&id)
                .map(DataEvent::RecordedProgramRemoved),
            (None, None) => None,
        }
    }

    fn index(&mut self, recording: ScheduledRecording) {
        if let Some(program_id) = recording.program_id() {
            self.program_index.insert(program_id, recording.id());
        }
        if recording.state() == RecordingState::NotStarted {
            self.pending_starts
                .insert((recording.start_time_ms(), recording.id()));
        }
        self.recordings.insert(recording.id(), recording);
    }

    fn unindex(&mut self, id: RecordingId) -> Option<ScheduledRecording> {
        let removed = self.recordings.remove(&id)?;
        self.pending_starts.remove(&(removed.start_time_ms(), id));
        if let Some(program_id) = removed.program_id()
            && self.program_index.get(&program_id) == Some(&id)
        {
            self.program_index.remove(&program_id);
        }
        Some(removed)
    }
}
