// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The control loop.
//!
//! One task owns the data manager, the scheduler and the input tracker.
//! Facade calls, store acknowledgements, session reports, alarm wake-ups,
//! input events and external store changes all arrive as messages and are
//! processed in order, so none of this state needs a lock.

use std::sync::Arc;

use dvr_core::{
    ChannelLookup, Clock, InputEvent, Program, RecordingState, ScheduledRecording, StoreChange,
    TunerService,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conflict::scheduled_recordings_that_conflict;
use crate::data::DvrDataManager;
use crate::inputs::InputTracker;
use crate::listener::{DataEvent, ListenerId};
use crate::persist::PersistAck;
use crate::reaper::Reaper;
use crate::scheduler::Scheduler;
use crate::session::SessionReport;

pub(crate) type ControlCall = Box<dyn FnOnce(&mut ControlState) + Send>;

pub(crate) enum ControlMsg {
    Call(ControlCall),
    Persisted(PersistAck),
    Session(SessionReport),
    Unsubscribe(ListenerId),
    Wake,
}

pub(crate) struct ControlState {
    pub(crate) data: DvrDataManager,
    pub(crate) scheduler: Scheduler,
    pub(crate) inputs: InputTracker,
    pub(crate) channels: Arc<dyn ChannelLookup>,
    pub(crate) clock: Arc<dyn Clock>,
    reaper: Reaper,
    ready: watch::Sender<bool>,
    initialized: bool,
}

impl ControlState {
    pub(crate) fn new(
        data: DvrDataManager,
        scheduler: Scheduler,
        inputs: InputTracker,
        channels: Arc<dyn ChannelLookup>,
        clock: Arc<dyn Clock>,
        reaper: Reaper,
        ready: watch::Sender<bool>,
    ) -> Self {
        Self {
            data,
            scheduler,
            inputs,
            channels,
            clock,
            reaper,
            ready,
            initialized: false,
        }
    }

    pub(crate) fn handle(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Call(call) => call(self),
            ControlMsg::Persisted(ack) => {
                let events = self.data.apply(ack);
                self.dispatch(events);
                self.check_initialized();
            }
            ControlMsg::Session(report) => self.on_session_report(report),
            ControlMsg::Unsubscribe(id) => {
                if self.data.listeners.remove(id) {
                    debug!(listener = ?id, "listener removed");
                }
            }
            ControlMsg::Wake => {
                debug!("scheduler alarm fired");
                self.scheduler.update(&self.data);
            }
        }
    }

    /// Scheduler first, then registered listeners.
    fn dispatch(&mut self, events: Vec<DataEvent>) {
        for event in events {
            self.scheduler.on_event(&self.data, &event);
            self.data.listeners.notify(&event);
        }
    }

    fn check_initialized(&mut self) {
        if self.initialized || !self.data.is_initialized() {
            return;
        }
        self.initialized = true;
        info!("recording data initialized");

        // Nothing can be recording before the first session starts.
        for stale in self
            .data
            .all_scheduled_recordings()
            .into_iter()
            .filter(|r| r.state() == RecordingState::InProgress)
        {
            warn!(recording_id = %stale.id(), "recording was left in progress, marking failed");
            self.data
                .update_scheduled_recording(stale.with_state(RecordingState::Failed), None);
        }

        self.scheduler.update(&self.data);
        self.sweep();
        self.ready.send_replace(true);
    }

    fn on_session_report(&mut self, report: SessionReport) {
        match report {
            SessionReport::Started(id) => self.persist_state(id, RecordingState::InProgress),
            SessionReport::Finished(id, program) => {
                self.scheduler.settle(id);
                self.persist_state(id, RecordingState::Finished);
                self.data.add_recorded_program(program, None);
            }
            SessionReport::Failed(id) => {
                self.scheduler.settle(id);
                self.persist_state(id, RecordingState::Failed);
            }
            SessionReport::Ended(key) => {
                self.scheduler.on_session_ended(key);
            }
        }
    }

    fn persist_state(&mut self, id: dvr_core::RecordingId, state: RecordingState) {
        match self.data.scheduled_recording(id) {
            Some(recording) => {
                info!(recording_id = %id, from = %recording.state(), to = %state, "recording state changed");
                self.data
                    .update_scheduled_recording(recording.with_state(state), None);
            }
            None => debug!(recording_id = %id, %state, "state change for removed recording dropped"),
        }
    }

    pub(crate) fn sweep(&mut self) {
        if self.data.is_initialized() {
            self.reaper.sweep(&self.data, self.clock.now_ms());
        }
    }

    /// Active recordings on the program's input that cannot be recorded
    /// alongside it.
    pub(crate) fn conflicts_for_program(&self, program: &Program) -> Vec<ScheduledRecording> {
        let Some(channel) = self.channels.channel(program.channel_id) else {
            debug!(channel_id = %program.channel_id, "conflict check for unknown channel");
            return Vec::new();
        };
        let tuner_count = self.inputs.tuner_count(&channel.input_id);
        let overlapping: Vec<ScheduledRecording> = self
            .data
            .recordings_that_overlap_with(&program.period())
            .into_iter()
            .filter(|r| r.state().is_active() && r.program_id() != Some(program.id))
            .filter(|r| {
                self.channels
                    .channel(r.channel_id())
                    .is_some_and(|c| c.input_id == channel.input_id)
            })
            .collect();
        scheduled_recordings_that_conflict(overlapping, tuner_count)
    }
}

pub(crate) struct ControlLoop {
    pub(crate) state: ControlState,
    pub(crate) rx: mpsc::UnboundedReceiver<ControlMsg>,
    pub(crate) tuner: Arc<dyn TunerService>,
    pub(crate) store_changes: Option<broadcast::Receiver<StoreChange>>,
    pub(crate) input_events: Option<broadcast::Receiver<InputEvent>>,
}

impl ControlLoop {
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let ControlLoop {
            mut state,
            mut rx,
            tuner,
            mut store_changes,
            mut input_events,
        } = self;

        let mut reaper_tick = tokio::time::interval(state.reaper.interval());
        reaper_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; initialization sweeps anyway.
        reaper_tick.tick().await;

        info!("control loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => state.handle(msg),
                    None => break,
                },
                change = recv_broadcast(&mut store_changes) => match change {
                    Ok(StoreChange::ScheduledRecordings(id)) => {
                        debug!(?id, "scheduled recordings changed externally");
                        state.data.refresh_scheduled_recordings(id);
                    }
                    Ok(StoreChange::RecordedPrograms(id)) => {
                        debug!(?id, "recorded programs changed externally");
                        state.data.refresh_recorded_programs(id);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store change notifications lagged, reloading");
                        state.data.refresh_scheduled_recordings(None);
                        state.data.refresh_recorded_programs(None);
                    }
                    Err(broadcast::error::RecvError::Closed) => store_changes = None,
                },
                event = recv_broadcast(&mut input_events) => match event {
                    Ok(event) => {
                        debug!(?event, "tuner input changed");
                        state.inputs.apply(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "input events lagged, resynchronizing");
                        state.inputs = InputTracker::new(tuner.inputs());
                    }
                    Err(broadcast::error::RecvError::Closed) => input_events = None,
                },
                _ = reaper_tick.tick() => state.sweep(),
            }
        }

        state.scheduler.shutdown();
        info!("control loop stopped");
    }
}

/// Receives from an optional broadcast receiver; a missing receiver never
/// yields.
async fn recv_broadcast<T: Clone>(
    rx: &mut Option<broadcast::Receiver<T>>,
) -> Result<T, broadcast::error::RecvError> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
