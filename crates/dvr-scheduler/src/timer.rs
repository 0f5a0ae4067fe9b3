// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancellable delayed delivery into a single-consumer queue.

use std::sync::Arc;
use std::time::Duration;

use dvr_core::Clock;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Sends messages into a queue at absolute wall-clock times.
pub(crate) struct DelayedQueue<M> {
    tx: mpsc::UnboundedSender<M>,
    clock: Arc<dyn Clock>,
}

impl<M> Clone for DelayedQueue<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<M: Send + 'static> DelayedQueue<M> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<M>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }

    /// Delivers `msg` at `at_ms`. The delay is `max(0, at_ms - now)`,
    /// evaluated now, so targets in the past fire immediately.
    pub(crate) fn send_at(&self, at_ms: i64, msg: M) -> TimerHandle {
        let delay = delay_until(self.clock.as_ref(), at_ms);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // Receiver gone means the queue shut down.
            let _ = tx.send(msg);
        });
        TimerHandle(task.abort_handle())
    }

    /// Immediate delivery.
    pub(crate) fn send(&self, msg: M) -> bool {
        self.tx.send(msg).is_ok()
    }
}

/// Pending delivery. Dropping the handle cancels it.
#[derive(Debug)]
pub(crate) struct TimerHandle(AbortHandle);

impl TimerHandle {
    pub(crate) fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) fn delay_until(clock: &dyn Clock, at_ms: i64) -> Duration {
    let remaining = at_ms.saturating_sub(clock.now_ms()).max(0);
    Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
}
