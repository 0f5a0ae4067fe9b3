// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces of the scheduler's external collaborators.
//!
//! The scheduler receives implementations through its constructor; nothing
//! here is a global.

pub mod alarm;
pub mod channel;
pub mod store;
pub mod tuner;

pub use alarm::{AlarmService, WakeFn};
pub use channel::{ChannelLookup, StaticChannels};
pub use store::{RecordingStore, StoreChange};
pub use tuner::{
    InputEvent, RecordingResult, TunerCallback, TunerErrorCode, TunerEvent, TunerService,
    TunerSession,
};
