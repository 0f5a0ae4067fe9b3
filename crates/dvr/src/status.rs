// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dvr status` command implementation.
//!
//! Reads scheduled recordings and recorded programs straight from the
//! database, so it works whether or not the daemon is running.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;

use chrono::{DateTime, Utc};
use dvr_config::DvrConfig;
use dvr_core::{DvrError, RecordedProgram, RecordingState, RecordingStore, ScheduledRecording};
use dvr_storage::SqliteRecordingStore;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database: String,
    pub counts: BTreeMap<String, usize>,
    pub scheduled: Vec<ScheduledRecording>,
    pub recorded: Vec<RecordedProgram>,
}

impl StatusResponse {
    fn new(
        database: String,
        mut scheduled: Vec<ScheduledRecording>,
        mut recorded: Vec<RecordedProgram>,
    ) -> Self {
        scheduled.sort_by(ScheduledRecording::start_time_cmp);
        recorded.sort_by_key(|p| p.start_time_ms);
        Self {
            database,
            counts: count_by_state(&scheduled),
            scheduled,
            recorded,
        }
    }
}

fn count_by_state(recordings: &[ScheduledRecording]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for recording in recordings {
        *counts.entry(recording.state().to_string()).or_default() += 1;
    }
    counts
}

/// Formats epoch milliseconds as UTC wall time.
fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Run the `dvr status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &DvrConfig, json: bool, plain: bool) -> Result<(), DvrError> {
    let path = &config.storage.database_path;
    if !Path::new(path).exists() {
        if json {
            let empty = StatusResponse::new(path.clone(), Vec::new(), Vec::new());
            print_json(&empty);
        } else {
            println!("dvr: no database at {path}");
        }
        return Ok(());
    }

    let store = SqliteRecordingStore::new(config.storage.clone());
    store.initialize().await?;
    let status = StatusResponse::new(
        path.clone(),
        store.query_recordings().await?,
        store.query_recorded_programs().await?,
    );

    if json {
        print_json(&status);
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_json(status: &StatusResponse) {
    println!(
        "{}",
        serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  dvr status ({})", status.database);
    println!("  {}", "-".repeat(35));

    if status.scheduled.is_empty() {
        println!("    No scheduled recordings.");
    }
    for recording in &status.scheduled {
        println!(
            "    #{:<5} ch {:<5} {} -> {}  prio {:<20} {}",
            recording.id(),
            recording.channel_id(),
            format_time(recording.start_time_ms()),
            format_time(recording.end_time_ms()),
            recording.priority(),
            state_label(recording.state(), use_color),
        );
    }

    println!();
    println!("  Recorded programs: {}", status.recorded.len());
    for program in &status.recorded {
        println!(
            "    #{:<5} ch {:<5} {}  {} bytes  {}",
            program.id,
            program.channel_id,
            format_time(program.start_time_ms),
            program.size_bytes,
            program.data_uri,
        );
    }
    println!();
}

fn state_label(state: RecordingState, use_color: bool) -> String {
    if !use_color {
        return state.to_string();
    }
    use colored::Colorize;
    let label = state.to_string();
    match state {
        RecordingState::NotStarted => label.normal().to_string(),
        RecordingState::InProgress => label.yellow().to_string(),
        RecordingState::Finished => label.green().to_string(),
        _ => label.red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::{ChannelId, InputId, RecordedProgramId, RecordingId};

    fn rec(id: i64, start: i64, state: RecordingState) -> ScheduledRecording {
        ScheduledRecording::builder_for_time_range(ChannelId(1), start, start + 1_000)
            .id(RecordingId(id))
            .state(state)
            .build()
            .unwrap()
    }

    #[test]
    fn format_time_renders_utc() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
        assert_eq!(format_time(1_700_000_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn response_sorts_and_counts() {
        let status = StatusResponse::new(
            "dvr.db".into(),
            vec![
                rec(1, 5_000, RecordingState::NotStarted),
                rec(2, 1_000, RecordingState::Finished),
                rec(3, 3_000, RecordingState::NotStarted),
            ],
            Vec::new(),
        );
        let ids: Vec<_> = status.scheduled.iter().map(|r| r.id().0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(status.counts.get("NOT_STARTED"), Some(&2));
        assert_eq!(status.counts.get("FINISHED"), Some(&1));
    }

    #[test]
    fn status_response_serializes() {
        let status = StatusResponse::new(
            "dvr.db".into(),
            vec![rec(1, 0, RecordingState::InProgress)],
            vec![RecordedProgram {
                id: RecordedProgramId(9),
                input_id: InputId::new("lo0"),
                channel_id: ChannelId(1),
                program_id: None,
                start_time_ms: 0,
                end_time_ms: 1_000,
                data_uri: "loopback://lo0/0".into(),
                size_bytes: 10,
            }],
        );
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"database\":\"dvr.db\""));
        assert!(json.contains("\"IN_PROGRESS\""));
        assert!(json.contains("loopback://lo0/0"));
    }

    #[test]
    fn plain_labels_have_no_escape_codes() {
        assert_eq!(state_label(RecordingState::Failed, false), "FAILED");
    }
}
