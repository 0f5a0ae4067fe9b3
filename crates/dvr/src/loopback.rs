// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback tuner for running the daemon without recording hardware.
//!
//! Every configured input offers `tuner_count` sessions. Tuning always
//! succeeds when the channel belongs to the session's input, recordings
//! produce no media, and the stop result carries a `loopback://` URI with a
//! size derived from the recorded duration. Callbacks are delivered from a
//! spawned task so they never run inside the calling command.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use dvr_core::{
    Channel, DvrError, InputEvent, InputId, ProgramId, RecordingResult, TunerCallback,
    TunerErrorCode, TunerEvent, TunerInputInfo, TunerService, TunerSession,
};

/// Simulated stream bitrate (20 Mbit/s).
const BYTES_PER_MS: u64 = 2_500;

type OpenCounts = Arc<Mutex<HashMap<InputId, u32>>>;

pub struct LoopbackTuner {
    inputs: Vec<TunerInputInfo>,
    open: OpenCounts,
    next_session: AtomicU64,
    input_events: broadcast::Sender<InputEvent>,
}

impl LoopbackTuner {
    pub fn new(inputs: Vec<TunerInputInfo>) -> Self {
        let (input_events, _) = broadcast::channel(16);
        Self {
            inputs,
            open: Arc::default(),
            next_session: AtomicU64::new(0),
            input_events,
        }
    }

    fn input(&self, id: &InputId) -> Option<&TunerInputInfo> {
        self.inputs.iter().find(|i| &i.id == id)
    }
}

impl TunerService for LoopbackTuner {
    fn inputs(&self) -> Vec<TunerInputInfo> {
        self.inputs.clone()
    }

    fn can_acquire(&self, input_id: &InputId) -> bool {
        let open = lock(&self.open).get(input_id).copied().unwrap_or(0);
        self.input(input_id)
            .is_some_and(|i| i.can_record && open < i.tuner_count)
    }

    fn open_session(
        &self,
        input_id: &InputId,
        callback: TunerCallback,
    ) -> Result<Box<dyn TunerSession>, DvrError> {
        let info = self.input(input_id).ok_or_else(|| DvrError::TunerUnavailable {
            input_id: input_id.clone(),
        })?;
        {
            let mut open = lock(&self.open);
            let count = open.entry(input_id.clone()).or_default();
            if !info.can_record || *count >= info.tuner_count {
                return Err(DvrError::TunerUnavailable {
                    input_id: input_id.clone(),
                });
            }
            *count += 1;
        }

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(input_id = %input_id, session = id, "loopback session opened");
        Ok(Box::new(LoopbackSession {
            id,
            input_id: input_id.clone(),
            callback,
            open: self.open.clone(),
            started: None,
            released: false,
        }))
    }

    fn subscribe_inputs(&self) -> broadcast::Receiver<InputEvent> {
        self.input_events.subscribe()
    }
}

struct LoopbackSession {
    id: u64,
    input_id: InputId,
    callback: TunerCallback,
    open: OpenCounts,
    started: Option<Instant>,
    released: bool,
}

impl LoopbackSession {
    fn deliver(&self, event: TunerEvent) {
        let callback = self.callback.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { callback.notify(event) });
            }
            Err(_) => callback.notify(event),
        }
    }
}

impl TunerSession for LoopbackSession {
    fn tune(&mut self, input_id: &InputId, channel: &Channel) -> Result<(), DvrError> {
        if self.released {
            return Err(DvrError::tuner("session already released"));
        }
        if &channel.input_id != input_id || input_id != &self.input_id {
            warn!(
                input_id = %self.input_id,
                channel_id = %channel.id,
                "channel is not carried by this input"
            );
            self.deliver(TunerEvent::Error(TunerErrorCode::ConnectionFailed));
            return Ok(());
        }
        debug!(input_id = %self.input_id, channel_id = %channel.id, "loopback tuned");
        self.deliver(TunerEvent::Tuned);
        Ok(())
    }

    fn start_recording(&mut self, program_id: Option<ProgramId>) -> Result<(), DvrError> {
        if self.released || self.started.is_some() {
            return Err(DvrError::tuner("session cannot start recording"));
        }
        self.started = Some(Instant::now());
        info!(
            input_id = %self.input_id,
            session = self.id,
            program_id = ?program_id,
            "loopback recording started"
        );
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), DvrError> {
        let started = self
            .started
            .take()
            .ok_or_else(|| DvrError::tuner("session is not recording"))?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = RecordingResult {
            data_uri: format!("loopback://{}/{}", self.input_id, self.id),
            size_bytes: elapsed_ms.saturating_mul(BYTES_PER_MS),
        };
        info!(
            input_id = %self.input_id,
            session = self.id,
            size_bytes = result.size_bytes,
            "loopback recording stopped"
        );
        self.deliver(TunerEvent::RecordingStopped(result));
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.started = None;
        if let Some(count) = lock(&self.open).get_mut(&self.input_id) {
            *count = count.saturating_sub(1);
        }
        debug!(input_id = %self.input_id, session = self.id, "loopback session released");
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock(open: &Mutex<HashMap<InputId, u32>>) -> MutexGuard<'_, HashMap<InputId, u32>> {
    open.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use dvr_core::ChannelId;
    use tokio::sync::mpsc;

    fn tuner(count: u32) -> LoopbackTuner {
        LoopbackTuner::new(vec![TunerInputInfo {
            id: InputId::new("lo0"),
            tuner_count: count,
            can_record: true,
        }])
    }

    fn channel(input: &str) -> Channel {
        Channel {
            id: ChannelId(4),
            input_id: InputId::new(input),
            display_number: "4".into(),
            name: "Four".into(),
        }
    }

    fn recorder() -> (TunerCallback, mpsc::UnboundedReceiver<TunerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = TunerCallback::new(move |event| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    #[test]
    fn capacity_is_bounded_by_tuner_count() {
        let tuner = tuner(1);
        let lo0 = InputId::new("lo0");
        let (callback, _rx) = recorder();

        let mut session = tuner.open_session(&lo0, callback.clone()).unwrap();
        assert!(!tuner.can_acquire(&lo0));
        assert!(matches!(
            tuner.open_session(&lo0, callback.clone()),
            Err(DvrError::TunerUnavailable { .. })
        ));
        session.release();
        assert!(tuner.can_acquire(&lo0));

        let dropped = tuner.open_session(&lo0, callback).unwrap();
        drop(dropped);
        assert!(tuner.can_acquire(&lo0));
        assert!(!tuner.can_acquire(&InputId::new("missing")));
    }

    #[tokio::test(start_paused = true)]
    async fn records_and_reports_size() {
        let tuner = tuner(2);
        let lo0 = InputId::new("lo0");
        let (callback, mut rx) = recorder();
        let mut session = tuner.open_session(&lo0, callback).unwrap();

        session.tune(&lo0, &channel("lo0")).unwrap();
        assert_eq!(rx.recv().await, Some(TunerEvent::Tuned));

        session.start_recording(None).unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        session.stop_recording().unwrap();

        match rx.recv().await {
            Some(TunerEvent::RecordingStopped(result)) => {
                assert!(result.data_uri.starts_with("loopback://lo0/"));
                assert_eq!(result.size_bytes, 2_000 * BYTES_PER_MS);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_channel_fails_to_tune() {
        let tuner = tuner(1);
        let lo0 = InputId::new("lo0");
        let (callback, mut rx) = recorder();
        let mut session = tuner.open_session(&lo0, callback).unwrap();

        session.tune(&lo0, &channel("lo1")).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(TunerEvent::Error(TunerErrorCode::ConnectionFailed))
        );
        assert!(session.stop_recording().is_err());
    }
}
