// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloneable facade over the control loop.
//!
//! Every method ships a closure to the control loop and awaits its result,
//! the same way a `tokio_rusqlite::Connection::call` ships work to its
//! connection thread. Reads see the in-memory index; writes resolve once
//! the store has acknowledged them.

use dvr_core::{
    ChannelId, DEFAULT_PRIORITY, DvrError, Period, Program, ProgramId, RecordedProgram,
    RecordedProgramId, RecordingId, ScheduledRecording, TunerInputInfo,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::control::{ControlMsg, ControlState};
use crate::listener::{
    DataEvent, RecordedProgramListener, ScheduledRecordingListener, Subscription,
};
use crate::persist::{Reply, respond};
use crate::session::SessionState;

#[derive(Clone)]
pub struct DvrHandle {
    control: mpsc::UnboundedSender<ControlMsg>,
    ready: watch::Receiver<bool>,
}

impl DvrHandle {
    pub(crate) fn new(control: mpsc::UnboundedSender<ControlMsg>, ready: watch::Receiver<bool>) -> Self {
        Self { control, ready }
    }

    /// Runs `f` on the control loop and returns its result.
    async fn call<R, F>(&self, f: F) -> Result<R, DvrError>
    where
        F: FnOnce(&mut ControlState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(ControlMsg::Call(Box::new(move |state| {
                let _ = tx.send(f(state));
            })))
            .map_err(|_| DvrError::Shutdown)?;
        rx.await.map_err(|_| DvrError::Shutdown)
    }

    /// Submits a write and waits for the store. `Ok(None)` means the write
    /// failed and memory was left unchanged.
    async fn write<T, F>(&self, f: F) -> Result<Option<T>, DvrError>
    where
        F: FnOnce(&mut ControlState, Reply<T>) + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.call(move |state| f(state, Some(tx))).await?;
        rx.await.map_err(|_| DvrError::Shutdown)
    }

    /// Resolves once both initial loads have completed.
    pub async fn initialized(&self) -> Result<(), DvrError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| DvrError::Shutdown)
    }

    pub async fn is_initialized(&self) -> Result<bool, DvrError> {
        self.call(|state| state.data.is_initialized()).await
    }

    pub async fn all_scheduled_recordings(&self) -> Result<Vec<ScheduledRecording>, DvrError> {
        self.call(|state| state.data.all_scheduled_recordings()).await
    }

    pub async fn recorded_programs(&self) -> Result<Vec<RecordedProgram>, DvrError> {
        self.call(|state| state.data.recorded_programs()).await
    }

    pub async fn started_recordings(&self) -> Result<Vec<ScheduledRecording>, DvrError> {
        self.call(|state| state.data.started_recordings()).await
    }

    pub async fn non_started_scheduled_recordings(
        &self,
    ) -> Result<Vec<ScheduledRecording>, DvrError> {
        self.call(|state| state.data.non_started_scheduled_recordings())
            .await
    }

    pub async fn recordings_that_overlap_with(
        &self,
        period: Period,
    ) -> Result<Vec<ScheduledRecording>, DvrError> {
        self.call(move |state| state.data.recordings_that_overlap_with(&period))
            .await
    }

    pub async fn next_scheduled_start_time_after(
        &self,
        time_ms: i64,
    ) -> Result<Option<i64>, DvrError> {
        self.call(move |state| state.data.next_scheduled_start_time_after(time_ms))
            .await
    }

    pub async fn scheduled_recording(
        &self,
        id: RecordingId,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        self.call(move |state| state.data.scheduled_recording(id))
            .await
    }

    pub async fn scheduled_recording_for_program(
        &self,
        program_id: ProgramId,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        self.call(move |state| state.data.scheduled_recording_for_program(program_id))
            .await
    }

    pub async fn recorded_program(
        &self,
        id: RecordedProgramId,
    ) -> Result<Option<RecordedProgram>, DvrError> {
        self.call(move |state| state.data.recorded_program(id)).await
    }

    /// Persists a new record. The returned value carries the assigned id.
    pub async fn add_scheduled_recording(
        &self,
        recording: ScheduledRecording,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        self.write(move |state, reply| state.data.add_scheduled_recording(recording, reply))
            .await
    }

    pub async fn update_scheduled_recording(
        &self,
        recording: ScheduledRecording,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        if !recording.id().is_set() {
            return Err(DvrError::InvalidRecording(
                "cannot update a recording without an id".into(),
            ));
        }
        self.write(move |state, reply| state.data.update_scheduled_recording(recording, reply))
            .await
    }

    /// Removing a record that is already gone succeeds.
    pub async fn remove_scheduled_recording(
        &self,
        recording: ScheduledRecording,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        self.write(move |state, reply| state.data.remove_scheduled_recording(recording, reply))
            .await
    }

    pub async fn add_recorded_program(
        &self,
        program: RecordedProgram,
    ) -> Result<Option<RecordedProgram>, DvrError> {
        self.write(move |state, reply| state.data.add_recorded_program(program, reply))
            .await
    }

    /// Deletes the record only; the media behind `data_uri` is untouched.
    pub async fn remove_recorded_program(
        &self,
        program: RecordedProgram,
    ) -> Result<Option<RecordedProgram>, DvrError> {
        self.write(move |state, reply| state.data.remove_recorded_program(program, reply))
            .await
    }

    /// Schedules `program`. With overrides the new record outranks the
    /// highest-priority one of them. An active record for the same program
    /// is returned as is.
    pub async fn add_schedule_for_program(
        &self,
        program: &Program,
        overrides: &[ScheduledRecording],
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        let priority = overrides
            .iter()
            .map(ScheduledRecording::priority)
            .min()
            .map_or(DEFAULT_PRIORITY, |highest| highest.saturating_sub(1));
        let recording = ScheduledRecording::builder_for_program(program)
            .priority(priority)
            .build()?;
        let program_id = program.id;
        self.write(move |state, reply| {
            match state
                .data
                .scheduled_recording_for_program(program_id)
                .filter(|existing| existing.state().is_active())
            {
                Some(existing) => {
                    debug!(program_id = %program_id, recording_id = %existing.id(), "program already scheduled");
                    respond(reply, Some(existing));
                }
                None => state.data.add_scheduled_recording(recording, reply),
            }
        })
        .await
    }

    pub async fn add_schedule_for_channel(
        &self,
        channel_id: ChannelId,
        start_time_ms: i64,
        end_time_ms: i64,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        let recording =
            ScheduledRecording::builder_for_time_range(channel_id, start_time_ms, end_time_ms)
                .build()?;
        self.add_scheduled_recording(recording).await
    }

    /// Active recordings on the program's input that would lose their tuner
    /// if the program were recorded too.
    pub async fn scheduled_recordings_that_conflict(
        &self,
        program: &Program,
    ) -> Result<Vec<ScheduledRecording>, DvrError> {
        let program = program.clone();
        self.call(move |state| state.conflicts_for_program(&program))
            .await
    }

    /// Asks the session of `id` to stop. Returns false when no session is
    /// running for it.
    pub async fn stop_recording(&self, id: RecordingId) -> Result<bool, DvrError> {
        self.call(move |state| state.scheduler.stop(id)).await
    }

    pub async fn session_state(&self, id: RecordingId) -> Result<Option<SessionState>, DvrError> {
        self.call(move |state| state.scheduler.session_state(id))
            .await
    }

    pub async fn watch_session(
        &self,
        id: RecordingId,
    ) -> Result<Option<watch::Receiver<SessionState>>, DvrError> {
        self.call(move |state| state.scheduler.watch_session(id))
            .await
    }

    pub async fn active_sessions(
        &self,
    ) -> Result<Vec<(ScheduledRecording, SessionState)>, DvrError> {
        self.call(|state| state.scheduler.active_sessions()).await
    }

    pub async fn next_wake_ms(&self) -> Result<Option<i64>, DvrError> {
        self.call(|state| state.scheduler.next_wake_ms()).await
    }

    pub async fn inputs(&self) -> Result<Vec<TunerInputInfo>, DvrError> {
        self.call(|state| state.inputs.all()).await
    }

    /// Re-evaluates upcoming recordings immediately.
    pub async fn update(&self) -> Result<(), DvrError> {
        self.call(|state| state.scheduler.update(&state.data)).await
    }

    pub async fn add_scheduled_recording_listener<L>(
        &self,
        listener: L,
    ) -> Result<Subscription, DvrError>
    where
        L: ScheduledRecordingListener + 'static,
    {
        let id = self
            .call(move |state| state.data.listeners.add_recording_listener(Box::new(listener)))
            .await?;
        Ok(Subscription::new(id, self.control.clone()))
    }

    pub async fn add_recorded_program_listener<L>(
        &self,
        listener: L,
    ) -> Result<Subscription, DvrError>
    where
        L: RecordedProgramListener + 'static,
    {
        let id = self
            .call(move |state| {
                state
                    .data
                    .listeners
                    .add_recorded_program_listener(Box::new(listener))
            })
            .await?;
        Ok(Subscription::new(id, self.control.clone()))
    }

    /// Streams every data event of both families until the subscription
    /// is dropped.
    pub async fn subscribe(
        &self,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<DataEvent>), DvrError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .call(move |state| state.data.listeners.add_stream(tx))
            .await?;
        Ok((Subscription::new(id, self.control.clone()), rx))
    }
}
