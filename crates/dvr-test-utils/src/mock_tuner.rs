// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock tuner service for deterministic testing.
//!
//! `MockTuner` implements `TunerService` over a fixed set of inputs. Every
//! session call is logged. In auto-respond mode (the default) `tune` answers
//! with `Tuned` and `stop_recording` with `RecordingStopped`; in manual mode
//! tests deliver callbacks themselves with [`MockTuner::fire`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use dvr_core::{
    Channel, ChannelId, DvrError, InputEvent, InputId, ProgramId, RecordingResult, TunerCallback,
    TunerErrorCode, TunerEvent, TunerInputInfo, TunerService, TunerSession,
};

/// One call made against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunerCall {
    Open(InputId),
    Tune(ChannelId),
    StartRecording(Option<ProgramId>),
    StopRecording,
    Release,
}

#[derive(Default)]
struct TunerState {
    inputs: Vec<TunerInputInfo>,
    busy: HashSet<InputId>,
    open: HashMap<InputId, u32>,
    calls: Vec<TunerCall>,
    callbacks: Vec<TunerCallback>,
    auto_respond: bool,
    tune_error: Option<TunerErrorCode>,
    fail_start: bool,
    panic_start: bool,
}

pub struct MockTuner {
    state: Arc<Mutex<TunerState>>,
    input_events: broadcast::Sender<InputEvent>,
}

impl MockTuner {
    pub fn new(inputs: Vec<TunerInputInfo>) -> Self {
        let (input_events, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(TunerState {
                inputs,
                auto_respond: true,
                ..TunerState::default()
            })),
            input_events,
        }
    }

    pub fn single_input(id: &str, tuner_count: u32) -> Self {
        Self::new(vec![TunerInputInfo {
            id: InputId::new(id),
            tuner_count,
            can_record: true,
        }])
    }

    /// Stops answering `tune` and `stop_recording` on its own.
    pub fn manual(self) -> Self {
        lock(&self.state).auto_respond = false;
        self
    }

    /// Makes `can_acquire` refuse the input.
    pub fn set_busy(&self, input_id: &InputId, busy: bool) {
        let mut state = lock(&self.state);
        if busy {
            state.busy.insert(input_id.clone());
        } else {
            state.busy.remove(input_id);
        }
    }

    /// Answers the next tunes with `Error(code)` instead of `Tuned`.
    pub fn fail_tune_with(&self, code: TunerErrorCode) {
        lock(&self.state).tune_error = Some(code);
    }

    /// Makes `start_recording` return an error.
    pub fn fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }

    /// Makes `start_recording` panic.
    pub fn panic_on_start(&self, panic: bool) {
        lock(&self.state).panic_start = panic;
    }

    pub fn calls(&self) -> Vec<TunerCall> {
        lock(&self.state).calls.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.state).callbacks.len()
    }

    /// Sessions currently holding a tuner.
    pub fn open_sessions(&self) -> u32 {
        lock(&self.state).open.values().sum()
    }

    /// Delivers `event` to the `index`-th session ever opened.
    pub fn fire(&self, index: usize, event: TunerEvent) -> bool {
        let callback = lock(&self.state).callbacks.get(index).cloned();
        match callback {
            Some(callback) => {
                callback.notify(event);
                true
            }
            None => false,
        }
    }

    pub fn add_input(&self, info: TunerInputInfo) {
        lock(&self.state).inputs.push(info.clone());
        let _ = self.input_events.send(InputEvent::Added(info));
    }

    pub fn remove_input(&self, id: &InputId) {
        lock(&self.state).inputs.retain(|i| &i.id != id);
        let _ = self.input_events.send(InputEvent::Removed(id.clone()));
    }
}

impl TunerService for MockTuner {
    fn inputs(&self) -> Vec<TunerInputInfo> {
        lock(&self.state).inputs.clone()
    }

    fn can_acquire(&self, input_id: &InputId) -> bool {
        let state = lock(&self.state);
        if state.busy.contains(input_id) {
            return false;
        }
        let open = state.open.get(input_id).copied().unwrap_or(0);
        state
            .inputs
            .iter()
            .any(|i| &i.id == input_id && i.can_record && open < i.tuner_count)
    }

    fn open_session(
        &self,
        input_id: &InputId,
        callback: TunerCallback,
    ) -> Result<Box<dyn TunerSession>, DvrError> {
        let mut state = lock(&self.state);
        state.calls.push(TunerCall::Open(input_id.clone()));
        *state.open.entry(input_id.clone()).or_default() += 1;
        state.callbacks.push(callback.clone());
        let index = state.callbacks.len() - 1;
        Ok(Box::new(MockTunerSession {
            index,
            input_id: input_id.clone(),
            callback,
            state: self.state.clone(),
            released: false,
        }))
    }

    fn subscribe_inputs(&self) -> broadcast::Receiver<InputEvent> {
        self.input_events.subscribe()
    }
}

struct MockTunerSession {
    index: usize,
    input_id: InputId,
    callback: TunerCallback,
    state: Arc<Mutex<TunerState>>,
    released: bool,
}

impl TunerSession for MockTunerSession {
    fn tune(&mut self, _input_id: &InputId, channel: &Channel) -> Result<(), DvrError> {
        let response = {
            let mut state = lock(&self.state);
            state.calls.push(TunerCall::Tune(channel.id));
            match (state.auto_respond, state.tune_error) {
                (true, Some(code)) => Some(TunerEvent::Error(code)),
                (true, None) => Some(TunerEvent::Tuned),
                (false, _) => None,
            }
        };
        if let Some(event) = response {
            self.callback.notify(event);
        }
        Ok(())
    }

    fn start_recording(&mut self, program_id: Option<ProgramId>) -> Result<(), DvrError> {
        let panic_start = {
            let mut state = lock(&self.state);
            state.calls.push(TunerCall::StartRecording(program_id));
            if state.fail_start {
                return Err(DvrError::tuner("injected start failure"));
            }
            state.panic_start
        };
        if panic_start {
            panic!("injected start panic");
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), DvrError> {
        let auto = {
            let mut state = lock(&self.state);
            state.calls.push(TunerCall::StopRecording);
            state.auto_respond
        };
        if auto {
            self.callback
                .notify(TunerEvent::RecordingStopped(RecordingResult {
                    data_uri: format!("mock://{}/{}", self.input_id, self.index),
                    size_bytes: 1024,
                }));
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = lock(&self.state);
        state.calls.push(TunerCall::Release);
        if let Some(open) = state.open.get_mut(&self.input_id) {
            *open = open.saturating_sub(1);
        }
    }
}

fn lock(state: &Mutex<TunerState>) -> MutexGuard<'_, TunerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
