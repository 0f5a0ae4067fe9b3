// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alarm that records what it was armed with and fires only on request.

use std::sync::{Mutex, MutexGuard, PoisonError};

use dvr_core::{AlarmService, WakeFn};

#[derive(Default)]
struct AlarmState {
    pending: Option<(i64, WakeFn)>,
    history: Vec<Option<i64>>,
}

#[derive(Default)]
pub struct MockAlarm {
    state: Mutex<AlarmState>,
}

impl MockAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the currently armed wake-up.
    pub fn armed_at(&self) -> Option<i64> {
        self.state().pending.as_ref().map(|(at, _)| *at)
    }

    /// Every arm (`Some(at)`) and cancel (`None`) in order.
    pub fn history(&self) -> Vec<Option<i64>> {
        self.state().history.clone()
    }

    /// Runs the armed wake-up now. Returns false when nothing was armed.
    pub fn fire(&self) -> bool {
        let pending = self.state().pending.take();
        match pending {
            Some((_, wake)) => {
                wake();
                true
            }
            None => false,
        }
    }

    fn state(&self) -> MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AlarmService for MockAlarm {
    fn arm(&self, at_ms: i64, wake: WakeFn) {
        let mut state = self.state();
        state.pending = Some((at_ms, wake));
        state.history.push(Some(at_ms));
    }

    fn cancel(&self) {
        let mut state = self.state();
        state.pending = None;
        state.history.push(None);
    }
}
