// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the persist worker, session worker and control loop.

use std::sync::Arc;
use std::time::Duration;

use dvr_config::DvrConfig;
use dvr_core::{AlarmService, ChannelLookup, Clock, RecordingStore, SystemClock, TunerService};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::alarm::TokioAlarm;
use crate::control::{ControlLoop, ControlState};
use crate::data::DvrDataManager;
use crate::handle::DvrHandle;
use crate::inputs::InputTracker;
use crate::persist::PersistWorker;
use crate::reaper::Reaper;
use crate::scheduler::Scheduler;
use crate::session::SessionContext;
use crate::timer::DelayedQueue;
use crate::worker::SessionWorker;

/// Timing knobs of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Recordings starting within this window get a session.
    pub soon_window_ms: i64,
    /// How long before the next start the alarm fires.
    pub wake_before_start_ms: i64,
    pub lead_ms: i64,
    pub trail_ms: i64,
    /// Retention of finished and failed records.
    pub keep_ms: i64,
    pub sweep_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            soon_window_ms: 5 * 60 * 1000,
            wake_before_start_ms: 60 * 1000,
            lead_ms: 5_000,
            trail_ms: 5_000,
            keep_ms: 2 * 24 * 60 * 60 * 1000,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &DvrConfig) -> Self {
        Self {
            soon_window_ms: config.scheduler.soon_window_ms(),
            wake_before_start_ms: config.scheduler.wake_before_start_ms(),
            lead_ms: i64::try_from(config.scheduler.lead_ms).unwrap_or(i64::MAX),
            trail_ms: i64::try_from(config.scheduler.trail_ms).unwrap_or(i64::MAX),
            keep_ms: config.retention.keep_ms(),
            sweep_interval: Duration::from_secs(config.retention.sweep_interval_secs),
        }
    }
}

pub struct DvrServiceBuilder {
    store: Arc<dyn RecordingStore>,
    tuner: Arc<dyn TunerService>,
    channels: Arc<dyn ChannelLookup>,
    alarm: Option<Arc<dyn AlarmService>>,
    clock: Option<Arc<dyn Clock>>,
    settings: SchedulerSettings,
    cancel: Option<CancellationToken>,
}

impl DvrServiceBuilder {
    /// Defaults to a [`TokioAlarm`] on the service clock.
    pub fn alarm(mut self, alarm: Arc<dyn AlarmService>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Ties the service lifetime to an outer token.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Spawns the workers on the current tokio runtime and starts loading
    /// the store.
    pub fn spawn(self) -> DvrService {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let alarm = self
            .alarm
            .unwrap_or_else(|| Arc::new(TokioAlarm::new(clock.clone())));
        let cancel = self.cancel.unwrap_or_default();
        let settings = self.settings;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);

        let store_changes = self.store.subscribe_changes();
        let input_events = self.tuner.subscribe_inputs();
        let inputs = InputTracker::new(self.tuner.inputs());

        let data = DvrDataManager::new(clock.clone(), persist_tx);
        data.start_loading();

        let scheduler = Scheduler::new(
            clock.clone(),
            alarm,
            control_tx.clone(),
            session_tx.clone(),
            settings.soon_window_ms,
            settings.wake_before_start_ms,
        );
        let state = ControlState::new(
            data,
            scheduler,
            inputs,
            self.channels.clone(),
            clock.clone(),
            Reaper::new(settings.keep_ms, settings.sweep_interval),
            ready_tx,
        );

        let session_ctx = SessionContext {
            tuner: self.tuner.clone(),
            channels: self.channels,
            clock: clock.clone(),
            queue: DelayedQueue::new(session_tx, clock),
            control: control_tx.clone(),
            lead_ms: settings.lead_ms,
            trail_ms: settings.trail_ms,
        };

        let persist = PersistWorker::new(self.store, persist_rx, control_tx.clone());
        let sessions = SessionWorker::new(session_ctx, session_rx);
        let control = ControlLoop {
            state,
            rx: control_rx,
            tuner: self.tuner,
            store_changes: Some(store_changes),
            input_events: Some(input_events),
        };

        let tasks = vec![
            tokio::spawn(persist.run()),
            tokio::spawn(sessions.run(cancel.clone())),
            tokio::spawn(control.run(cancel.clone())),
        ];
        info!(
            soon_window_ms = settings.soon_window_ms,
            wake_before_start_ms = settings.wake_before_start_ms,
            "dvr scheduler started"
        );

        DvrService {
            handle: DvrHandle::new(control_tx, ready_rx),
            cancel,
            tasks,
        }
    }
}

/// Running scheduler. Dropping it without [`shutdown`](Self::shutdown)
/// leaves the tasks running until the cancel token fires.
pub struct DvrService {
    handle: DvrHandle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DvrService {
    pub fn builder(
        store: Arc<dyn RecordingStore>,
        tuner: Arc<dyn TunerService>,
        channels: Arc<dyn ChannelLookup>,
    ) -> DvrServiceBuilder {
        DvrServiceBuilder {
            store,
            tuner,
            channels,
            alarm: None,
            clock: None,
            settings: SchedulerSettings::default(),
            cancel: None,
        }
    }

    pub fn handle(&self) -> DvrHandle {
        self.handle.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every session and waits for the workers. Writes already
    /// queued are still applied to the store.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Waits until the cancel token fires, then for the workers to finish.
    pub async fn wait(self) {
        self.cancel.cancelled().await;
        self.join().await;
    }

    async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "dvr worker task failed");
            }
        }
        info!("dvr scheduler stopped");
    }
}
