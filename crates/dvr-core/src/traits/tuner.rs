// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tuner/recording capability.
//!
//! Commands are issued synchronously and never block; their outcome arrives
//! later through the [`TunerCallback`] handed to [`TunerService::open_session`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::broadcast;

use crate::error::DvrError;
use crate::types::{Channel, InputId, ProgramId, TunerInputInfo};

/// Error codes reported by a tuner session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum TunerErrorCode {
    Unknown,
    ResourceBusy,
    InsufficientSpace,
    ConnectionFailed,
}

/// Outcome of a completed recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingResult {
    pub data_uri: String,
    pub size_bytes: u64,
}

/// Asynchronous notification from a tuner session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunerEvent {
    /// The session is tuned to the requested channel.
    Tuned,
    /// Recording stopped and the media is available.
    RecordingStopped(RecordingResult),
    Error(TunerErrorCode),
}

/// Receiver of [`TunerEvent`]s for a single session.
#[derive(Clone)]
pub struct TunerCallback(Arc<dyn Fn(TunerEvent) + Send + Sync>);

impl TunerCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(TunerEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn notify(&self, event: TunerEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for TunerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TunerCallback")
    }
}

/// Change to the set of tuner inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Added(TunerInputInfo),
    Removed(InputId),
    Updated(TunerInputInfo),
}

/// An open recording session on one tuner.
pub trait TunerSession: Send {
    fn tune(&mut self, input_id: &InputId, channel: &Channel) -> Result<(), DvrError>;

    fn start_recording(&mut self, program_id: Option<ProgramId>) -> Result<(), DvrError>;

    fn stop_recording(&mut self) -> Result<(), DvrError>;

    /// Frees the tuner. Must be safe to call in any state.
    fn release(&mut self);
}

/// Factory for tuner sessions plus the directory of tuner inputs.
pub trait TunerService: Send + Sync {
    fn inputs(&self) -> Vec<TunerInputInfo>;

    /// Whether a new session could currently be opened on the input.
    fn can_acquire(&self, input_id: &InputId) -> bool;

    fn open_session(
        &self,
        input_id: &InputId,
        callback: TunerCallback,
    ) -> Result<Box<dyn TunerSession>, DvrError>;

    fn subscribe_inputs(&self) -> broadcast::Receiver<InputEvent>;
}
