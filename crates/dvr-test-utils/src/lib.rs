// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for DVR scheduler integration tests.
//!
//! Provides in-process collaborators for fast, deterministic tests without
//! tuner hardware or a database.
//!
//! # Components
//!
//! - [`MemoryStore`] - Recording store with failure injection and external change injection
//! - [`MockTuner`] - Tuner service that records every call and answers callbacks
//! - [`MockAlarm`] - Alarm that only fires when told to
//! - [`TestHarness`] - Fully wired scheduler on a paused-time tokio clock

pub mod harness;
pub mod memory_store;
pub mod mock_alarm;
pub mod mock_tuner;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::MemoryStore;
pub use mock_alarm::MockAlarm;
pub use mock_tuner::{MockTuner, TunerCall};
