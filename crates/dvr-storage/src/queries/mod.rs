// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries, one module per table.

pub mod recorded_programs;
pub mod recordings;

use std::str::FromStr;

use rusqlite::types::Type;

/// Parses a TEXT column into a strum-backed enum.
pub(crate) fn parse_text<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
