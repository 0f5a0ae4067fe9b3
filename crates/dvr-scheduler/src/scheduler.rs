// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides which scheduled recordings get a session and when to wake up
//! next.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dvr_core::{AlarmService, Clock, Period, RecordingId, RecordingState, ScheduledRecording};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::control::ControlMsg;
use crate::data::DvrDataManager;
use crate::listener::DataEvent;
use crate::session::{SessionCommand, SessionKey, SessionMsg, SessionState};

struct SessionHandle {
    key: SessionKey,
    recording: ScheduledRecording,
    state: watch::Receiver<SessionState>,
}

pub(crate) struct Scheduler {
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmService>,
    control: mpsc::UnboundedSender<ControlMsg>,
    session_tx: mpsc::UnboundedSender<SessionMsg>,
    soon_window_ms: i64,
    wake_before_start_ms: i64,
    sessions: HashMap<RecordingId, SessionHandle>,
    /// Recordings whose session reported a final outcome that the store has
    /// not acknowledged yet. They still read as `NOT_STARTED` and must not
    /// get another session.
    settling: HashSet<RecordingId>,
    next_generation: u64,
    next_wake_ms: Option<i64>,
}

impl Scheduler {
    pub(crate) fn new(
        clock: Arc<dyn Clock>,
        alarm: Arc<dyn AlarmService>,
        control: mpsc::UnboundedSender<ControlMsg>,
        session_tx: mpsc::UnboundedSender<SessionMsg>,
        soon_window_ms: i64,
        wake_before_start_ms: i64,
    ) -> Self {
        Self {
            clock,
            alarm,
            control,
            session_tx,
            soon_window_ms,
            wake_before_start_ms,
            sessions: HashMap::new(),
            settling: HashSet::new(),
            next_generation: 0,
            next_wake_ms: None,
        }
    }

    /// Starts sessions for every not-started recording inside the soon
    /// window, then re-arms the alarm.
    pub(crate) fn update(&mut self, data: &DvrDataManager) {
        if !data.is_initialized() {
            return;
        }
        let now = self.clock.now_ms();
        let mut due: Vec<ScheduledRecording> = data
            .recordings_that_overlap_with(&self.soon_window(now))
            .into_iter()
            .filter(|r| r.state() == RecordingState::NotStarted && self.is_schedulable(r.id()))
            .collect();
        due.sort_by(ScheduledRecording::start_time_cmp);
        for recording in due {
            self.create_session(recording);
        }
        self.update_next_alarm(data);
    }

    pub(crate) fn on_event(&mut self, data: &DvrDataManager, event: &DataEvent) {
        match event {
            DataEvent::RecordingAdded(recording) => {
                let now = self.clock.now_ms();
                if recording.state() == RecordingState::NotStarted
                    && recording.is_overlapping(&self.soon_window(now))
                    && self.is_schedulable(recording.id())
                {
                    self.create_session(recording.clone());
                }
                self.update_next_alarm(data);
            }
            DataEvent::RecordingRemoved(recording) => {
                self.settling.remove(&recording.id());
                if let Some(handle) = self.sessions.get(&recording.id()) {
                    debug!(recording_id = %recording.id(), "cancelling session of removed recording");
                    self.send(SessionMsg::Command(handle.key, SessionCommand::Cancel));
                }
                self.update_next_alarm(data);
            }
            // State changes are driven by the sessions; a stored outcome
            // ends settling.
            DataEvent::RecordingStatusChanged(recording) => {
                if recording.state() != RecordingState::NotStarted {
                    self.settling.remove(&recording.id());
                }
            }
            DataEvent::RecordedProgramAdded(_)
            | DataEvent::RecordedProgramChanged(_)
            | DataEvent::RecordedProgramRemoved(_) => {}
        }
    }

    /// Forgets a finished session. A newer session for the same recording
    /// is left alone.
    pub(crate) fn on_session_ended(&mut self, key: SessionKey) {
        if self.sessions.get(&key.id).is_some_and(|h| h.key == key) {
            self.sessions.remove(&key.id);
            debug!(recording_id = %key.id, "session ended");
        }
    }

    /// Holds `id` back from new sessions until its outcome is stored.
    pub(crate) fn settle(&mut self, id: RecordingId) {
        self.settling.insert(id);
    }

    pub(crate) fn stop(&self, id: RecordingId) -> bool {
        match self.sessions.get(&id) {
            Some(handle) => {
                self.send(SessionMsg::Command(handle.key, SessionCommand::Stop));
                true
            }
            None => false,
        }
    }

    pub(crate) fn session_state(&self, id: RecordingId) -> Option<SessionState> {
        self.sessions.get(&id).map(|h| *h.state.borrow())
    }

    pub(crate) fn watch_session(&self, id: RecordingId) -> Option<watch::Receiver<SessionState>> {
        self.sessions.get(&id).map(|h| h.state.clone())
    }

    pub(crate) fn active_sessions(&self) -> Vec<(ScheduledRecording, SessionState)> {
        let mut sessions: Vec<_> = self
            .sessions
            .values()
            .map(|h| (h.recording.clone(), *h.state.borrow()))
            .collect();
        sessions.sort_by(|a, b| ScheduledRecording::start_time_cmp(&a.0, &b.0));
        sessions
    }

    pub(crate) fn next_wake_ms(&self) -> Option<i64> {
        self.next_wake_ms
    }

    /// Disarms the alarm and cancels every running session.
    pub(crate) fn shutdown(&mut self) {
        self.alarm.cancel();
        self.next_wake_ms = None;
        for handle in self.sessions.values() {
            self.send(SessionMsg::Command(handle.key, SessionCommand::Cancel));
        }
    }

    fn is_schedulable(&self, id: RecordingId) -> bool {
        !self.sessions.contains_key(&id) && !self.settling.contains(&id)
    }

    fn soon_window(&self, now: i64) -> Period {
        Period::new(now, now.saturating_add(self.soon_window_ms))
    }

    fn create_session(&mut self, recording: ScheduledRecording) {
        let key = SessionKey {
            id: recording.id(),
            generation: self.next_generation,
        };
        self.next_generation += 1;
        let (state_tx, state_rx) = watch::channel(SessionState::NotStarted);
        self.sessions.insert(
            key.id,
            SessionHandle {
                key,
                recording: recording.clone(),
                state: state_rx,
            },
        );
        self.send(SessionMsg::Create {
            key,
            recording,
            state_tx,
        });
    }

    /// Arms the alarm for the first start after every pending session's
    /// start, or disarms it when nothing is left.
    fn update_next_alarm(&mut self, data: &DvrDataManager) {
        let now = self.clock.now_ms();
        let after = self
            .sessions
            .values()
            .map(|h| h.recording.start_time_ms())
            .max()
            .map_or(now, |latest| latest.max(now));

        match data.next_scheduled_start_time_after(after) {
            Some(next_start) => {
                let wake_at = next_start.saturating_sub(self.wake_before_start_ms);
                if self.next_wake_ms != Some(wake_at) {
                    info!(next_start, wake_at, "arming scheduler alarm");
                }
                let control = self.control.clone();
                self.alarm.arm(
                    wake_at,
                    Box::new(move || {
                        let _ = control.send(ControlMsg::Wake);
                    }),
                );
                self.next_wake_ms = Some(wake_at);
            }
            None => {
                if self.next_wake_ms.take().is_some() {
                    debug!("no upcoming recordings, alarm disarmed");
                }
                self.alarm.cancel();
            }
        }
    }

    fn send(&self, msg: SessionMsg) {
        if self.session_tx.send(msg).is_err() {
            debug!("session worker gone, dropping session message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::{ChannelId, ManualClock};
    use dvr_test_utils::MockAlarm;

    use crate::persist::PersistAck;

    const NOW: i64 = 10_000_000;
    const MINUTE: i64 = 60_000;

    struct Rig {
        data: DvrDataManager,
        scheduler: Scheduler,
        alarm: Arc<MockAlarm>,
        session_rx: mpsc::UnboundedReceiver<SessionMsg>,
        _control_rx: mpsc::UnboundedReceiver<ControlMsg>,
    }

    fn rig(recordings: Vec<ScheduledRecording>) -> Rig {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));
        let (persist_tx, _persist_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let mut data = DvrDataManager::new(clock.clone(), persist_tx);
        data.apply(PersistAck::RecordingsLoaded(recordings));
        data.apply(PersistAck::RecordedProgramsLoaded(Vec::new()));
        let alarm = Arc::new(MockAlarm::new());
        let scheduler = Scheduler::new(
            clock,
            alarm.clone(),
            control_tx,
            session_tx,
            5 * MINUTE,
            MINUTE,
        );
        Rig {
            data,
            scheduler,
            alarm,
            session_rx,
            _control_rx: control_rx,
        }
    }

    fn rec(id: i64, start: i64, state: RecordingState) -> ScheduledRecording {
        ScheduledRecording::builder_for_time_range(ChannelId(1), start, start + 30 * MINUTE)
            .id(RecordingId(id))
            .state(state)
            .build()
            .unwrap()
    }

    fn created(rx: &mut mpsc::UnboundedReceiver<SessionMsg>) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let SessionMsg::Create { key, .. } = msg {
                ids.push(key.id.0);
            }
        }
        ids
    }

    #[test]
    fn update_starts_due_recordings_and_arms_for_the_next() {
        let mut rig = rig(vec![
            rec(1, NOW + MINUTE, RecordingState::NotStarted),
            rec(2, NOW + 10 * MINUTE, RecordingState::NotStarted),
            rec(3, NOW + 2 * MINUTE, RecordingState::Finished),
            rec(4, NOW - 10 * MINUTE, RecordingState::NotStarted),
        ]);
        rig.scheduler.update(&rig.data);

        assert_eq!(created(&mut rig.session_rx), vec![4, 1]);
        assert_eq!(rig.alarm.armed_at(), Some(NOW + 9 * MINUTE));
        assert_eq!(rig.scheduler.next_wake_ms(), Some(NOW + 9 * MINUTE));
        assert_eq!(
            rig.scheduler.session_state(RecordingId(1)),
            Some(SessionState::NotStarted)
        );

        rig.scheduler.update(&rig.data);
        assert!(created(&mut rig.session_rx).is_empty());
    }

    #[test]
    fn update_waits_for_initialization() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));
        let (persist_tx, _persist_rx) = mpsc::unbounded_channel();
        let (control_tx, _control_rx) = mpsc::unbounded_channel();
        let (session_tx, mut session_rx) = mpsc::unbounded_channel();
        let data = DvrDataManager::new(clock.clone(), persist_tx);
        let alarm = Arc::new(MockAlarm::new());
        let mut scheduler =
            Scheduler::new(clock, alarm.clone(), control_tx, session_tx, 5 * MINUTE, MINUTE);
        scheduler.update(&data);
        assert!(session_rx.try_recv().is_err());
        assert!(alarm.history().is_empty());
    }

    #[test]
    fn nothing_upcoming_disarms() {
        let mut rig = rig(vec![rec(1, NOW + MINUTE, RecordingState::NotStarted)]);
        rig.scheduler.update(&rig.data);
        assert_eq!(rig.alarm.armed_at(), None);
        assert_eq!(rig.alarm.history(), vec![None]);
    }

    #[test]
    fn added_recording_outside_window_rearms() {
        let later = rec(7, NOW + 30 * MINUTE, RecordingState::NotStarted);
        let mut rig = rig(vec![later.clone()]);
        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingAdded(later));
        assert!(created(&mut rig.session_rx).is_empty());
        assert_eq!(rig.alarm.armed_at(), Some(NOW + 29 * MINUTE));
    }

    #[test]
    fn added_recording_inside_window_gets_a_session() {
        let mut rig = rig(Vec::new());
        rig.scheduler.on_event(
            &rig.data,
            &DataEvent::RecordingAdded(rec(8, NOW + MINUTE, RecordingState::NotStarted)),
        );
        assert_eq!(created(&mut rig.session_rx), vec![8]);
    }

    #[test]
    fn removing_tracked_recording_cancels_its_session() {
        let recording = rec(1, NOW + MINUTE, RecordingState::NotStarted);
        let mut rig = rig(vec![recording.clone()]);
        rig.scheduler.update(&rig.data);
        created(&mut rig.session_rx);

        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingRemoved(recording));
        match rig.session_rx.try_recv() {
            Ok(SessionMsg::Command(key, SessionCommand::Cancel)) => {
                assert_eq!(key.id, RecordingId(1))
            }
            _ => panic!("expected a cancel command"),
        }
    }

    #[test]
    fn removing_untracked_recording_only_rearms() {
        let mut rig = rig(vec![rec(2, NOW + 20 * MINUTE, RecordingState::NotStarted)]);
        rig.scheduler.update(&rig.data);
        assert_eq!(rig.alarm.armed_at(), Some(NOW + 19 * MINUTE));
        let armed = rig.alarm.history().len();

        let untracked = rec(9, NOW + MINUTE, RecordingState::NotStarted);
        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingRemoved(untracked));
        assert!(rig.session_rx.try_recv().is_err());
        assert!(rig.scheduler.active_sessions().is_empty());
        assert_eq!(rig.alarm.history().len(), armed + 1);
        assert_eq!(rig.alarm.armed_at(), Some(NOW + 19 * MINUTE));

        let last = rec(2, NOW + 20 * MINUTE, RecordingState::NotStarted);
        for event in rig.data.apply(PersistAck::RecordingDeleted(last, None)) {
            rig.scheduler.on_event(&rig.data, &event);
        }
        assert!(rig.session_rx.try_recv().is_err());
        assert_eq!(rig.alarm.armed_at(), None);
        assert_eq!(rig.scheduler.next_wake_ms(), None);
    }

    #[test]
    fn settled_recording_is_not_restarted_before_its_outcome_is_stored() {
        let recording = rec(1, NOW + MINUTE, RecordingState::NotStarted);
        let mut rig = rig(vec![recording.clone()]);
        rig.scheduler.update(&rig.data);
        assert_eq!(created(&mut rig.session_rx), vec![1]);

        // Failed report, then the session ends before the store answers.
        rig.scheduler.settle(RecordingId(1));
        rig.scheduler.on_session_ended(SessionKey {
            id: RecordingId(1),
            generation: 0,
        });
        rig.scheduler.update(&rig.data);
        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingAdded(recording.clone()));
        assert!(created(&mut rig.session_rx).is_empty());

        let failed = recording.with_state(RecordingState::Failed);
        for event in rig.data.apply(PersistAck::RecordingUpdated(failed, None)) {
            rig.scheduler.on_event(&rig.data, &event);
        }
        rig.scheduler.update(&rig.data);
        assert!(created(&mut rig.session_rx).is_empty());
    }

    #[test]
    fn removal_releases_a_settling_recording() {
        let recording = rec(1, NOW + MINUTE, RecordingState::NotStarted);
        let mut rig = rig(Vec::new());
        rig.scheduler.settle(RecordingId(1));
        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingRemoved(recording.clone()));

        rig.scheduler
            .on_event(&rig.data, &DataEvent::RecordingAdded(recording));
        assert_eq!(created(&mut rig.session_rx), vec![1]);
    }

    #[test]
    fn stale_end_report_keeps_newer_session() {
        let mut rig = rig(vec![rec(1, NOW + MINUTE, RecordingState::NotStarted)]);
        rig.scheduler.update(&rig.data);
        let stale = SessionKey {
            id: RecordingId(1),
            generation: 99,
        };
        rig.scheduler.on_session_ended(stale);
        assert!(rig.scheduler.session_state(RecordingId(1)).is_some());

        rig.scheduler.on_session_ended(SessionKey {
            id: RecordingId(1),
            generation: 0,
        });
        assert!(rig.scheduler.session_state(RecordingId(1)).is_none());
        assert!(!rig.scheduler.stop(RecordingId(1)));
    }

    #[test]
    fn shutdown_cancels_sessions_and_alarm() {
        let mut rig = rig(vec![
            rec(1, NOW + MINUTE, RecordingState::NotStarted),
            rec(2, NOW + 20 * MINUTE, RecordingState::NotStarted),
        ]);
        rig.scheduler.update(&rig.data);
        created(&mut rig.session_rx);
        rig.scheduler.shutdown();

        assert_eq!(rig.alarm.armed_at(), None);
        assert!(matches!(
            rig.session_rx.try_recv(),
            Ok(SessionMsg::Command(_, SessionCommand::Cancel))
        ));
    }
}
