// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change listeners for scheduled recordings and recorded programs.
//!
//! Listeners run on the control loop, one notification at a time, in the
//! order the store acknowledged the underlying writes.

use std::panic::{AssertUnwindSafe, catch_unwind};

use dvr_core::{RecordedProgram, ScheduledRecording};
use tokio::sync::mpsc;
use tracing::error;

use crate::control::ControlMsg;

/// Lifecycle of scheduled recordings.
pub trait ScheduledRecordingListener: Send {
    fn on_scheduled_recording_added(&mut self, _recording: &ScheduledRecording) {}

    fn on_scheduled_recording_removed(&mut self, _recording: &ScheduledRecording) {}

    /// Any acknowledged update, not only state changes.
    fn on_scheduled_recording_status_changed(&mut self, _recording: &ScheduledRecording) {}
}

/// Lifecycle of recorded programs.
pub trait RecordedProgramListener: Send {
    fn on_recorded_program_added(&mut self, _program: &RecordedProgram) {}

    fn on_recorded_program_changed(&mut self, _program: &RecordedProgram) {}

    fn on_recorded_program_removed(&mut self, _program: &RecordedProgram) {}
}

/// A change applied to the in-memory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    RecordingAdded(ScheduledRecording),
    RecordingRemoved(ScheduledRecording),
    RecordingStatusChanged(ScheduledRecording),
    RecordedProgramAdded(RecordedProgram),
    RecordedProgramChanged(RecordedProgram),
    RecordedProgramRemoved(RecordedProgram),
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Registered {
    Recording(Box<dyn ScheduledRecordingListener>),
    RecordedProgram(Box<dyn RecordedProgramListener>),
    /// Receives every event of both families.
    Stream(mpsc::UnboundedSender<DataEvent>),
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(ListenerId, Registered)>,
}

impl ListenerRegistry {
    pub(crate) fn add_recording_listener(
        &mut self,
        listener: Box<dyn ScheduledRecordingListener>,
    ) -> ListenerId {
        self.push(Registered::Recording(listener))
    }

    pub(crate) fn add_recorded_program_listener(
        &mut self,
        listener: Box<dyn RecordedProgramListener>,
    ) -> ListenerId {
        self.push(Registered::RecordedProgram(listener))
    }

    pub(crate) fn add_stream(&mut self, tx: mpsc::UnboundedSender<DataEvent>) -> ListenerId {
        self.push(Registered::Stream(tx))
    }

    fn push(&mut self, entry: Registered) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, entry));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Delivers `event` to every interested listener. A panicking listener
    /// is logged and skipped.
    pub(crate) fn notify(&mut self, event: &DataEvent) {
        for (id, entry) in &mut self.entries {
            let outcome = catch_unwind(AssertUnwindSafe(|| deliver(entry, event)));
            if outcome.is_err() {
                error!(listener = ?id, ?event, "listener panicked");
            }
        }
    }
}

fn deliver(entry: &mut Registered, event: &DataEvent) {
    match (entry, event) {
        (Registered::Stream(tx), event) => {
            // A closed receiver is cleaned up when its subscription drops.
            let _ = tx.send(event.clone());
        }
        (Registered::Recording(l), DataEvent::RecordingAdded(r)) => {
            l.on_scheduled_recording_added(r)
        }
        (Registered::Recording(l), DataEvent::RecordingRemoved(r)) => {
            l.on_scheduled_recording_removed(r)
        }
        (Registered::Recording(l), DataEvent::RecordingStatusChanged(r)) => {
            l.on_scheduled_recording_status_changed(r)
        }
        (Registered::RecordedProgram(l), DataEvent::RecordedProgramAdded(p)) => {
            l.on_recorded_program_added(p)
        }
        (Registered::RecordedProgram(l), DataEvent::RecordedProgramChanged(p)) => {
            l.on_recorded_program_changed(p)
        }
        (Registered::RecordedProgram(l), DataEvent::RecordedProgramRemoved(p)) => {
            l.on_recorded_program_removed(p)
        }
        _ => {}
    }
}

/// Registration handle. Dropping it unregisters the listener.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    control: mpsc::UnboundedSender<ControlMsg>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, control: mpsc::UnboundedSender<ControlMsg>) -> Self {
        Self { id, control }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Control loop already gone means nothing left to unregister.
        let _ = self.control.send(ControlMsg::Unsubscribe(self.id));
    }
}
