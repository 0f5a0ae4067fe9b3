// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the DVR recording scheduler.
//!
//! A single tokio-rusqlite connection serializes all writes. The schema is
//! managed by embedded refinery migrations, and [`SqliteRecordingStore`]
//! implements the scheduler's `RecordingStore` interface on top of the typed
//! query modules.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteRecordingStore;
pub use database::Database;
