// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retention of finished and failed recordings.

use std::time::Duration;

use dvr_core::{RecordingState, ScheduledRecording};
use tracing::info;

use crate::data::DvrDataManager;

/// Removes `FINISHED` and `FAILED` records whose end lies further back than
/// the retention window.
#[derive(Debug, Clone)]
pub(crate) struct Reaper {
    keep_ms: i64,
    interval: Duration,
}

impl Reaper {
    pub(crate) fn new(keep_ms: i64, interval: Duration) -> Self {
        Self { keep_ms, interval }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn expired(&self, data: &DvrDataManager, now_ms: i64) -> Vec<ScheduledRecording> {
        let cutoff = now_ms.saturating_sub(self.keep_ms);
        data.all_scheduled_recordings()
            .into_iter()
            .filter(|r| {
                matches!(r.state(), RecordingState::Finished | RecordingState::Failed)
                    && r.end_time_ms() < cutoff
            })
            .collect()
    }

    /// Queues removal of every expired record. Returns how many were queued.
    pub(crate) fn sweep(&self, data: &DvrDataManager, now_ms: i64) -> usize {
        let expired = self.expired(data, now_ms);
        let count = expired.len();
        for recording in expired {
            data.remove_scheduled_recording(recording, None);
        }
        if count > 0 {
            info!(count, keep_ms = self.keep_ms, "removing expired recordings");
        }
        count
    }
}
