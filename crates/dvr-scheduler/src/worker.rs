// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution context for recording sessions.
//!
//! Every session message (creation, tuner callbacks, timers, stop and
//! cancel requests) goes through one queue and is handled here one at a
//! time, so session transitions never race each other.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use dvr_core::RecordingId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::session::{
    Flow, RecordingSession, SessionCommand, SessionContext, SessionKey, SessionMsg, SessionReport,
};

pub(crate) struct SessionWorker {
    ctx: SessionContext,
    rx: mpsc::UnboundedReceiver<SessionMsg>,
    sessions: HashMap<RecordingId, RecordingSession>,
}

impl SessionWorker {
    pub(crate) fn new(ctx: SessionContext, rx: mpsc::UnboundedReceiver<SessionMsg>) -> Self {
        Self {
            ctx,
            rx,
            sessions: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg),
                    None => break,
                },
            }
        }
        self.cancel_all();
        debug!("session worker stopped");
    }

    fn dispatch(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::Create {
                key,
                recording,
                state_tx,
            } => {
                if let Some(existing) = self.sessions.get(&key.id) {
                    debug!(recording_id = %key.id, state = %existing.state(), "session already running");
                    return;
                }
                info!(
                    recording_id = %key.id,
                    channel_id = %recording.channel_id(),
                    start_time_ms = recording.start_time_ms(),
                    "creating recording session"
                );
                self.sessions
                    .insert(key.id, RecordingSession::new(key, recording, state_tx));
                self.run_command(key, SessionCommand::Init);
            }
            SessionMsg::Command(key, command) => self.run_command(key, command),
        }
    }

    fn run_command(&mut self, key: SessionKey, command: SessionCommand) {
        let Some(session) = self.sessions.get_mut(&key.id) else {
            debug!(recording_id = %key.id, ?command, "message for unknown session ignored");
            return;
        };
        if session.key() != key {
            debug!(recording_id = %key.id, generation = key.generation, "message for stale session ignored");
            return;
        }

        let ctx = &self.ctx;
        let done = match catch_unwind(AssertUnwindSafe(|| session.handle(command, ctx))) {
            Ok(Ok(Flow::Continue)) => false,
            Ok(Ok(Flow::Done)) => true,
            Ok(Err(e)) => {
                fail(session, &e.to_string(), ctx);
                true
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(recording_id = %key.id, reason = %reason, "recording session panicked");
                fail(session, &reason, ctx);
                true
            }
        };

        if done {
            self.sessions.remove(&key.id);
            self.ctx.report(SessionReport::Ended(key));
        }
    }

    fn cancel_all(&mut self) {
        let keys: Vec<SessionKey> = self.sessions.values().map(RecordingSession::key).collect();
        for key in keys {
            self.run_command(key, SessionCommand::Cancel);
        }
    }
}

fn fail(session: &mut RecordingSession, reason: &str, ctx: &SessionContext) {
    if catch_unwind(AssertUnwindSafe(|| session.fail(reason, ctx))).is_err() {
        error!(recording_id = %session.key().id, "panic while failing session");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
