// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wake-up capability used by the scheduler to re-evaluate upcoming work.

/// Action run when an alarm fires.
pub type WakeFn = Box<dyn FnOnce() + Send + 'static>;

/// A single-slot alarm.
///
/// Arming replaces any previously armed wake-up, so re-arming with the same
/// time is harmless.
pub trait AlarmService: Send + Sync {
    fn arm(&self, at_ms: i64, wake: WakeFn);

    fn cancel(&self);
}
