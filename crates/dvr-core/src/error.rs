// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the DVR recording scheduler.

use thiserror::Error;

use crate::types::{InputId, RecordingId};

/// The primary error type used across the DVR crates.
#[derive(Debug, Error)]
pub enum DvrError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent store errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Tuner capability errors (session open, tune, record commands).
    #[error("tuner error: {message}")]
    Tuner {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No tuner session can be acquired on the input.
    #[error("no tuner available on input {input_id}")]
    TunerUnavailable { input_id: InputId },

    /// A recording record failed validation.
    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// A recording referenced by id does not exist.
    #[error("recording not found: {0}")]
    NotFound(RecordingId),

    /// The control loop is no longer running.
    #[error("dvr service is shut down")]
    Shutdown,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DvrError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DvrError::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a tuner error without an underlying source.
    pub fn tuner(message: impl Into<String>) -> Self {
        DvrError::Tuner {
            message: message.into(),
            source: None,
        }
    }
}
