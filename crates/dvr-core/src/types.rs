// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the store, the tuner capability and the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a scheduled recording, assigned by the persistent store.
    RecordingId
);
numeric_id!(
    /// Identifier of a channel in the channel directory.
    ChannelId
);
numeric_id!(
    /// Identifier of a program-guide entry.
    ProgramId
);
numeric_id!(
    /// Identifier of a finished recording's media record.
    RecordedProgramId
);

impl RecordingId {
    /// Placeholder id carried by a record that has not been persisted yet.
    pub const UNSET: RecordingId = RecordingId(-1);

    pub fn is_set(self) -> bool {
        self.0 >= 0
    }
}

impl RecordedProgramId {
    pub const UNSET: RecordedProgramId = RecordedProgramId(-1);
}

/// Identifier of a tuner input (a physical or virtual tuner device).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(pub String);

impl InputId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted lifecycle state of a scheduled recording.
///
/// `UnexpectedlyStopped` is part of the stored vocabulary but the scheduler
/// never produces it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingState {
    NotStarted,
    InProgress,
    UnexpectedlyStopped,
    Finished,
    Failed,
}

impl RecordingState {
    /// States that still occupy (or will occupy) a tuner.
    pub fn is_active(self) -> bool {
        matches!(self, RecordingState::NotStarted | RecordingState::InProgress)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecordingState::Finished | RecordingState::Failed | RecordingState::UnexpectedlyStopped
        )
    }
}

/// How a scheduled recording was created.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingType {
    /// A fixed channel and time range.
    Timed,
    /// Linked to a program-guide entry.
    Program,
}

/// A closed time interval in UTC milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Period {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }
}

/// A channel as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub input_id: InputId,
    pub display_number: String,
    pub name: String,
}

/// A program-guide entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub channel_id: ChannelId,
    pub title: String,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

impl Program {
    pub fn period(&self) -> Period {
        Period::new(self.start_time_ms, self.end_time_ms)
    }
}

/// Media produced by a finished recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedProgram {
    pub id: RecordedProgramId,
    pub input_id: InputId,
    pub channel_id: ChannelId,
    pub program_id: Option<ProgramId>,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub data_uri: String,
    pub size_bytes: u64,
}

impl RecordedProgram {
    /// Returns a copy carrying the id assigned by the store.
    pub fn with_id(mut self, id: RecordedProgramId) -> Self {
        self.id = id;
        self
    }
}

/// Capacity information for a tuner input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerInputInfo {
    pub id: InputId,
    /// Number of programs the input can record in parallel.
    pub tuner_count: u32,
    pub can_record: bool,
}
