// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dvr schedule` command implementation.
//!
//! Inserts a `TIMED` record directly into the database. A running daemon
//! notices the commit within `storage.change_poll_ms` and schedules it; a
//! stopped one loads it on its next start.

use chrono::DateTime;
use clap::Args;
use dvr_config::DvrConfig;
use dvr_core::{ChannelId, DvrError, RecordingStore, ScheduledRecording};
use dvr_storage::SqliteRecordingStore;

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Channel id from the `[[channels]]` directory.
    #[arg(long)]
    pub channel: i64,

    /// Start time, RFC 3339 (e.g. 2026-01-01T20:00:00Z).
    #[arg(long)]
    pub start: String,

    /// End time, RFC 3339.
    #[arg(long)]
    pub end: String,

    /// Lower values win tuner conflicts.
    #[arg(long)]
    pub priority: Option<i64>,
}

fn parse_time(flag: &str, value: &str) -> Result<i64, DvrError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.timestamp_millis())
        .map_err(|e| DvrError::InvalidRecording(format!("--{flag} `{value}`: {e}")))
}

/// Validates the arguments against the channel directory and builds the record.
fn build_recording(
    config: &DvrConfig,
    args: &ScheduleArgs,
) -> Result<ScheduledRecording, DvrError> {
    if !config.channels.iter().any(|c| c.id == args.channel) {
        return Err(DvrError::InvalidRecording(format!(
            "channel {} is not in the [[channels]] directory",
            args.channel
        )));
    }
    let start = parse_time("start", &args.start)?;
    let end = parse_time("end", &args.end)?;

    let mut builder =
        ScheduledRecording::builder_for_time_range(ChannelId(args.channel), start, end);
    if let Some(priority) = args.priority {
        builder = builder.priority(priority);
    }
    builder.build()
}

/// Run the `dvr schedule` command.
pub async fn run_schedule(config: &DvrConfig, args: &ScheduleArgs) -> Result<(), DvrError> {
    let recording = build_recording(config, args)?;

    let store = SqliteRecordingStore::new(config.storage.clone());
    store.initialize().await?;
    let id = store.insert_recording(&recording).await?;

    println!(
        "dvr: scheduled recording #{id} on channel {} ({} -> {})",
        args.channel, args.start, args.end
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::{DEFAULT_PRIORITY, RecordingType};

    fn config() -> DvrConfig {
        dvr_config::load_and_validate_str(
            r#"
            [[inputs]]
            id = "lo0"

            [[channels]]
            id = 7
            input_id = "lo0"
            "#,
        )
        .unwrap()
    }

    fn args(channel: i64, start: &str, end: &str) -> ScheduleArgs {
        ScheduleArgs {
            channel,
            start: start.into(),
            end: end.into(),
            priority: None,
        }
    }

    #[test]
    fn builds_timed_record() {
        let recording = build_recording(
            &config(),
            &args(7, "2026-01-01T20:00:00Z", "2026-01-01T21:00:00+00:00"),
        )
        .unwrap();
        assert_eq!(recording.recording_type(), RecordingType::Timed);
        assert_eq!(recording.channel_id(), ChannelId(7));
        assert_eq!(recording.duration_ms(), 3_600_000);
        assert_eq!(recording.priority(), DEFAULT_PRIORITY);
        assert!(!recording.id().is_set());
    }

    #[test]
    fn honours_offsets_and_priority() {
        let mut a = args(7, "2026-01-01T21:00:00+01:00", "2026-01-01T20:30:00Z");
        a.priority = Some(3);
        let recording = build_recording(&config(), &a).unwrap();
        assert_eq!(recording.duration_ms(), 30 * 60 * 1000);
        assert_eq!(recording.priority(), 3);
    }

    #[test]
    fn rejects_unknown_channel() {
        let err = build_recording(
            &config(),
            &args(8, "2026-01-01T20:00:00Z", "2026-01-01T21:00:00Z"),
        )
        .unwrap_err();
        assert!(matches!(err, DvrError::InvalidRecording(_)));
    }

    #[test]
    fn rejects_malformed_and_inverted_times() {
        let cfg = config();
        assert!(build_recording(&cfg, &args(7, "tomorrow", "2026-01-01T21:00:00Z")).is_err());
        assert!(
            build_recording(&cfg, &args(7, "2026-01-01T21:00:00Z", "2026-01-01T20:00:00Z"))
                .is_err()
        );
    }
}
