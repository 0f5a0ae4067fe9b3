// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`AlarmService`] backed by a tokio sleep.

use std::sync::{Arc, Mutex};

use dvr_core::{AlarmService, Clock, WakeFn};
use tokio::task::AbortHandle;
use tracing::debug;

use crate::timer::delay_until;

/// Single-slot alarm. Arming aborts the previously armed wake-up.
pub struct TokioAlarm {
    clock: Arc<dyn Clock>,
    pending: Mutex<Option<AbortHandle>>,
}

impl TokioAlarm {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(None),
        }
    }

    fn replace(&self, next: Option<AbortHandle>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = std::mem::replace(&mut *pending, next) {
            previous.abort();
        }
    }
}

impl AlarmService for TokioAlarm {
    fn arm(&self, at_ms: i64, wake: WakeFn) {
        let delay = delay_until(self.clock.as_ref(), at_ms);
        debug!(at_ms, delay_ms = delay.as_millis() as u64, "arming wake-up alarm");
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            wake();
        });
        self.replace(Some(task.abort_handle()));
    }

    fn cancel(&self) {
        self.replace(None);
    }
}

impl Drop for TokioAlarm {
    fn drop(&mut self) {
        self.replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::TokioClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter_wake(counter: &Arc<AtomicUsize>) -> WakeFn {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous_alarm() {
        let alarm = TokioAlarm::new(Arc::new(TokioClock::starting_at(0)));
        let fired = Arc::new(AtomicUsize::new(0));

        alarm.arm(1_000, counter_wake(&fired));
        alarm.arm(2_000, counter_wake(&fired));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms() {
        let alarm = TokioAlarm::new(Arc::new(TokioClock::starting_at(0)));
        let fired = Arc::new(AtomicUsize::new(0));
        alarm.arm(500, counter_wake(&fired));
        alarm.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
