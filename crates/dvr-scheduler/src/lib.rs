// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording scheduler for the DVR.
//!
//! [`DvrService`] spawns three tasks:
//!
//! - the control loop, owning the in-memory [`DvrDataManager`], the
//!   scheduler and the tuner input tracker;
//! - the persist worker, the single writer to the [`RecordingStore`];
//! - the session worker, running one state machine per recording that is
//!   about to start.
//!
//! Callers talk to the control loop through a cloneable [`DvrHandle`].
//!
//! [`RecordingStore`]: dvr_core::RecordingStore

pub mod alarm;
pub mod conflict;
mod control;
pub mod data;
pub mod handle;
mod inputs;
pub mod listener;
mod persist;
mod reaper;
mod scheduler;
pub mod service;
pub mod session;
mod timer;
mod worker;

pub use alarm::TokioAlarm;
pub use conflict::scheduled_recordings_that_conflict;
pub use data::DvrDataManager;
pub use handle::DvrHandle;
pub use listener::{
    DataEvent, ListenerId, RecordedProgramListener, ScheduledRecordingListener, Subscription,
};
pub use service::{DvrService, DvrServiceBuilder, SchedulerSettings};
pub use session::{SessionKey, SessionState};
