// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recording session state machine.
//!
//! A [`RecordingSession`] drives one scheduled recording through the tuner:
//!
//! ```text
//! NOT_STARTED -> SESSION_ACQUIRED -> CONNECTION_PENDING -> CONNECTED
//!     -> RECORDING_STARTED -> RECORDING_STOP_REQUESTED -> RELEASED
//! ```
//!
//! Any failure moves to `ERROR` and then `RELEASED`. Timer and tuner
//! messages that arrive in a state that does not expect them are ignored,
//! which is how a cancelled or superseded timer becomes harmless.

use std::sync::Arc;

use dvr_core::{
    Channel, ChannelLookup, Clock, DvrError, RecordedProgram, RecordedProgramId, RecordingId,
    RecordingResult, ScheduledRecording, TunerCallback, TunerEvent, TunerService, TunerSession,
};
use serde::Serialize;
use strum::Display;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::control::ControlMsg;
use crate::timer::{DelayedQueue, TimerHandle};

/// Observable state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    NotStarted,
    SessionAcquired,
    ConnectionPending,
    Connected,
    RecordingStarted,
    RecordingStopRequested,
    Error,
    Released,
}

/// Identity of one session instance. The generation distinguishes
/// successive sessions created for the same recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub id: RecordingId,
    pub generation: u64,
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Init,
    Tuner(TunerEvent),
    StartTimer,
    StopTimer,
    /// External stop request.
    Stop,
    /// The recording was removed.
    Cancel,
}

pub(crate) enum SessionMsg {
    Create {
        key: SessionKey,
        recording: ScheduledRecording,
        state_tx: watch::Sender<SessionState>,
    },
    Command(SessionKey, SessionCommand),
}

/// Outcome reported back to the control loop.
#[derive(Debug)]
pub(crate) enum SessionReport {
    Started(RecordingId),
    Finished(RecordingId, RecordedProgram),
    Failed(RecordingId),
    /// The session is gone; always the last report for a key.
    Ended(SessionKey),
}

/// Collaborators shared by every session on the worker.
pub(crate) struct SessionContext {
    pub(crate) tuner: Arc<dyn TunerService>,
    pub(crate) channels: Arc<dyn ChannelLookup>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) queue: DelayedQueue<SessionMsg>,
    pub(crate) control: mpsc::UnboundedSender<ControlMsg>,
    pub(crate) lead_ms: i64,
    pub(crate) trail_ms: i64,
}

impl SessionContext {
    pub(crate) fn report(&self, report: SessionReport) {
        if self.control.send(ControlMsg::Session(report)).is_err() {
            debug!("control loop gone, dropping session report");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Done,
}

pub(crate) struct RecordingSession {
    key: SessionKey,
    recording: ScheduledRecording,
    channel: Option<Channel>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    tuner: Option<Box<dyn TunerSession>>,
    start_timer: Option<TimerHandle>,
    stop_timer: Option<TimerHandle>,
}

impl RecordingSession {
    pub(crate) fn new(
        key: SessionKey,
        recording: ScheduledRecording,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            key,
            recording,
            channel: None,
            state: SessionState::NotStarted,
            state_tx,
            tuner: None,
            start_timer: None,
            stop_timer: None,
        }
    }

    pub(crate) fn key(&self) -> SessionKey {
        self.key
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn handle(
        &mut self,
        command: SessionCommand,
        ctx: &SessionContext,
    ) -> Result<Flow, DvrError> {
        match command {
            SessionCommand::Init => self.init(ctx),
            SessionCommand::Tuner(TunerEvent::Tuned) => Ok(self.on_tuned(ctx)),
            SessionCommand::Tuner(TunerEvent::RecordingStopped(result)) => {
                Ok(self.on_recording_stopped(result, ctx))
            }
            SessionCommand::Tuner(TunerEvent::Error(code)) => Err(DvrError::Tuner {
                message: format!("tuner reported {code} in state {}", self.state),
                source: None,
            }),
            SessionCommand::StartTimer => self.on_start_timer(ctx),
            SessionCommand::StopTimer => self.on_stop_timer(),
            SessionCommand::Stop => self.on_stop_requested(),
            SessionCommand::Cancel => Ok(self.cancel()),
        }
    }

    fn init(&mut self, ctx: &SessionContext) -> Result<Flow, DvrError> {
        if self.state != SessionState::NotStarted {
            return Ok(Flow::Continue);
        }
        let now = ctx.clock.now_ms();
        if self.recording.end_time_ms() <= now {
            return Err(DvrError::InvalidRecording(format!(
                "end time {} already passed at {now}",
                self.recording.end_time_ms()
            )));
        }

        let channel = ctx
            .channels
            .channel(self.recording.channel_id())
            .ok_or_else(|| {
                DvrError::InvalidRecording(format!(
                    "unknown channel {}",
                    self.recording.channel_id()
                ))
            })?;
        if channel.id != self.recording.channel_id() {
            return Err(DvrError::InvalidRecording(format!(
                "channel {} does not match recording channel {}",
                channel.id,
                self.recording.channel_id()
            )));
        }

        if !ctx.tuner.can_acquire(&channel.input_id) {
            return Err(DvrError::TunerUnavailable {
                input_id: channel.input_id.clone(),
            });
        }

        let key = self.key;
        let queue = ctx.queue.clone();
        let callback = TunerCallback::new(move |event| {
            queue.send(SessionMsg::Command(key, SessionCommand::Tuner(event)));
        });
        self.tuner = Some(ctx.tuner.open_session(&channel.input_id, callback)?);
        self.set_state(SessionState::SessionAcquired);

        self.tuner()?.tune(&channel.input_id, &channel)?;
        self.channel = Some(channel);
        self.set_state(SessionState::ConnectionPending);
        Ok(Flow::Continue)
    }

    fn on_tuned(&mut self, ctx: &SessionContext) -> Flow {
        if self.state != SessionState::ConnectionPending {
            debug!(recording_id = %self.key.id, state = %self.state, "ignoring tuned callback");
            return Flow::Continue;
        }
        self.set_state(SessionState::Connected);
        let start_at = self.recording.start_time_ms().saturating_sub(ctx.lead_ms);
        self.start_timer = Some(ctx.queue.send_at(
            start_at,
            SessionMsg::Command(self.key, SessionCommand::StartTimer),
        ));
        Flow::Continue
    }

    fn on_start_timer(&mut self, ctx: &SessionContext) -> Result<Flow, DvrError> {
        if self.state != SessionState::Connected {
            debug!(recording_id = %self.key.id, state = %self.state, "ignoring start timer");
            return Ok(Flow::Continue);
        }
        self.start_timer = None;
        let program_id = self.recording.program_id();
        self.tuner()?.start_recording(program_id)?;
        self.set_state(SessionState::RecordingStarted);
        ctx.report(SessionReport::Started(self.key.id));

        let stop_at = self.recording.end_time_ms().saturating_add(ctx.trail_ms);
        self.stop_timer = Some(ctx.queue.send_at(
            stop_at,
            SessionMsg::Command(self.key, SessionCommand::StopTimer),
        ));
        Ok(Flow::Continue)
    }

    fn on_stop_timer(&mut self) -> Result<Flow, DvrError> {
        if self.state != SessionState::RecordingStarted {
            debug!(recording_id = %self.key.id, state = %self.state, "ignoring stop timer");
            return Ok(Flow::Continue);
        }
        self.stop_timer = None;
        self.request_stop()?;
        Ok(Flow::Continue)
    }

    fn request_stop(&mut self) -> Result<(), DvrError> {
        self.tuner()?.stop_recording()?;
        self.set_state(SessionState::RecordingStopRequested);
        Ok(())
    }

    fn on_recording_stopped(&mut self, result: RecordingResult, ctx: &SessionContext) -> Flow {
        if !matches!(
            self.state,
            SessionState::RecordingStarted | SessionState::RecordingStopRequested
        ) {
            debug!(recording_id = %self.key.id, state = %self.state, "ignoring recording-stopped callback");
            return Flow::Continue;
        }

        if let Some(channel) = &self.channel {
            let program = RecordedProgram {
                id: RecordedProgramId::UNSET,
                input_id: channel.input_id.clone(),
                channel_id: channel.id,
                program_id: self.recording.program_id(),
                start_time_ms: self.recording.start_time_ms(),
                end_time_ms: self.recording.end_time_ms(),
                data_uri: result.data_uri,
                size_bytes: result.size_bytes,
            };
            info!(
                recording_id = %self.key.id,
                data_uri = %program.data_uri,
                size_bytes = program.size_bytes,
                "recording finished"
            );
            ctx.report(SessionReport::Finished(self.key.id, program));
        }
        self.clear_timers();
        self.release();
        Flow::Done
    }

    /// An external stop ends an active recording normally. Before recording
    /// has started it simply releases the tuner.
    fn on_stop_requested(&mut self) -> Result<Flow, DvrError> {
        match self.state {
            SessionState::RecordingStarted => {
                self.stop_timer = None;
                self.request_stop()?;
                Ok(Flow::Continue)
            }
            SessionState::RecordingStopRequested => Ok(Flow::Continue),
            _ => {
                info!(recording_id = %self.key.id, state = %self.state, "stop requested before recording, releasing");
                self.clear_timers();
                self.release();
                Ok(Flow::Done)
            }
        }
    }

    fn cancel(&mut self) -> Flow {
        self.clear_timers();
        if self.state == SessionState::RecordingStarted
            && let Some(tuner) = self.tuner.as_mut()
            && let Err(e) = tuner.stop_recording()
        {
            warn!(recording_id = %self.key.id, error = %e, "stop on cancel failed");
        }
        self.release();
        debug!(recording_id = %self.key.id, "session cancelled");
        Flow::Done
    }

    /// Moves to `ERROR`, reports the failure and releases the tuner.
    pub(crate) fn fail(&mut self, reason: &str, ctx: &SessionContext) {
        warn!(
            recording_id = %self.key.id,
            channel_id = %self.recording.channel_id(),
            state = %self.state,
            reason,
            "recording session failed"
        );
        self.clear_timers();
        self.set_state(SessionState::Error);
        ctx.report(SessionReport::Failed(self.key.id));
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut tuner) = self.tuner.take() {
            tuner.release();
        }
        self.set_state(SessionState::Released);
    }

    fn clear_timers(&mut self) {
        if let Some(timer) = self.start_timer.take() {
            timer.cancel();
        }
        if let Some(timer) = self.stop_timer.take() {
            timer.cancel();
        }
    }

    fn tuner(&mut self) -> Result<&mut Box<dyn TunerSession>, DvrError> {
        self.tuner
            .as_mut()
            .ok_or_else(|| DvrError::Internal("no tuner session".into()))
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(recording_id = %self.key.id, from = %self.state, to = %state, "session transition");
        self.state = state;
        self.state_tx.send_replace(state);
    }
}
