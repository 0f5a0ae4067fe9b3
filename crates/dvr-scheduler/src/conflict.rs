// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tuner conflict resolution.

use dvr_core::ScheduledRecording;

/// Recordings that would not be recorded if a new recording were scheduled
/// next to `overlapping` on an input with `tuner_count` tuners.
///
/// The candidate keeps one tuner for itself, so up to `tuner_count - 1` of
/// the highest-priority overlapping recordings survive. The rest, lowest
/// priority last, are returned. With zero tuners every overlapping
/// recording conflicts.
pub fn scheduled_recordings_that_conflict(
    mut overlapping: Vec<ScheduledRecording>,
    tuner_count: u32,
) -> Vec<ScheduledRecording> {
    overlapping.sort_by(ScheduledRecording::priority_cmp);
    let free_slots = usize::try_from(tuner_count.saturating_sub(1)).unwrap_or(usize::MAX);
    if free_slots >= overlapping.len() {
        return Vec::new();
    }
    overlapping.split_off(free_slots)
}
