// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end scheduler tests.
//!
//! `TestHarness` wires a [`DvrService`] to a [`MemoryStore`], a
//! [`MockTuner`] and a static channel directory, on a [`TokioClock`]. Run
//! it under `#[tokio::test(start_paused = true)]` so timers and the clock
//! advance together and instantly.

use std::sync::Arc;
use std::time::Duration;

use dvr_core::{
    Channel, ChannelId, Clock, DvrError, InputId, RecordingId, RecordingState, ScheduledRecording,
    StaticChannels, TokioClock, TunerInputInfo,
};
use dvr_scheduler::{DvrHandle, DvrService, SchedulerSettings};

use crate::memory_store::MemoryStore;
use crate::mock_tuner::MockTuner;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    inputs: Vec<TunerInputInfo>,
    channels: Vec<Channel>,
    recordings: Vec<ScheduledRecording>,
    settings: SchedulerSettings,
    start_ms: i64,
    manual_tuner: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            inputs: Vec::new(),
            channels: Vec::new(),
            recordings: Vec::new(),
            settings: SchedulerSettings::default(),
            start_ms: 1_700_000_000_000,
            manual_tuner: false,
        }
    }

    pub fn with_input(mut self, id: &str, tuner_count: u32) -> Self {
        self.inputs.push(TunerInputInfo {
            id: InputId::new(id),
            tuner_count,
            can_record: true,
        });
        self
    }

    pub fn with_channel(mut self, id: i64, input_id: &str) -> Self {
        self.channels.push(Channel {
            id: ChannelId(id),
            input_id: InputId::new(input_id),
            display_number: id.to_string(),
            name: format!("Channel {id}"),
        });
        self
    }

    /// Seeds the store before the service loads it.
    pub fn with_recording(mut self, recording: ScheduledRecording) -> Self {
        self.recordings.push(recording);
        self
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wall-clock time the harness clock starts at.
    pub fn starting_at(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Tuner callbacks must be fired by the test.
    pub fn manual_tuner(mut self) -> Self {
        self.manual_tuner = true;
        self
    }

    /// Spawns the service and waits for its initial load.
    pub async fn build(self) -> Result<TestHarness, DvrError> {
        let clock = Arc::new(TokioClock::starting_at(self.start_ms));
        let store = Arc::new(MemoryStore::with_recordings(self.recordings));
        let tuner = MockTuner::new(self.inputs);
        let tuner = Arc::new(if self.manual_tuner {
            tuner.manual()
        } else {
            tuner
        });
        let channels = Arc::new(StaticChannels::new(self.channels));

        let service = DvrService::builder(store.clone(), tuner.clone(), channels)
            .clock(clock.clone())
            .settings(self.settings)
            .spawn();
        let handle = service.handle();
        handle.initialized().await?;

        Ok(TestHarness {
            service,
            handle,
            store,
            tuner,
            clock,
        })
    }
}

/// A running scheduler with in-process collaborators.
pub struct TestHarness {
    pub service: DvrService,
    pub handle: DvrHandle,
    pub store: Arc<MemoryStore>,
    pub tuner: Arc<MockTuner>,
    pub clock: Arc<TokioClock>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Lets every task run until nothing is left to do at the current
    /// instant. Paused time only auto-advances once all tasks are idle.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Advances the clock to `at_ms`, firing every timer on the way.
    pub async fn advance_to(&self, at_ms: i64) {
        let remaining = at_ms.saturating_sub(self.now_ms()).max(0);
        tokio::time::sleep(Duration::from_millis(u64::try_from(remaining).unwrap_or(0))).await;
        self.settle().await;
    }

    /// Polls until the record reaches `state` or `timeout` of clock time
    /// passes. Returns the final value.
    pub async fn wait_for_state(
        &self,
        id: RecordingId,
        state: RecordingState,
        timeout: Duration,
    ) -> Result<Option<ScheduledRecording>, DvrError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.handle.scheduled_recording(id).await?;
            if current.as_ref().is_some_and(|r| r.state() == state)
                || tokio::time::Instant::now() >= deadline
            {
                return Ok(current);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn shutdown(self) {
        self.service.shutdown().await;
    }
}
