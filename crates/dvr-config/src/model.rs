// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the DVR daemon.
//!
//! Every struct rejects unknown keys so typos surface at startup.

use dvr_core::{Channel, ChannelId, InputId, TunerInputInfo};
use serde::{Deserialize, Serialize};

/// Top-level DVR configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DvrConfig {
    /// Daemon identity and logging.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// SQLite store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler timing windows.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Retention of finished and failed records.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Tuner inputs exposed by the loopback tuner.
    #[serde(default)]
    pub inputs: Vec<InputConfig>,

    /// Channel directory.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl DvrConfig {
    pub fn tuner_inputs(&self) -> Vec<TunerInputInfo> {
        self.inputs.iter().map(InputConfig::to_info).collect()
    }

    pub fn channel_directory(&self) -> Vec<Channel> {
        self.channels.iter().map(ChannelConfig::to_channel).collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Name used in log output.
    #[serde(default = "default_daemon_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: default_daemon_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_daemon_name() -> String {
    "dvr".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable write-ahead logging.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How often `dvr serve` checks for commits made by other processes,
    /// such as `dvr schedule`. `0` disables the check.
    #[serde(default = "default_change_poll_ms")]
    pub change_poll_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            change_poll_ms: default_change_poll_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("dvr").join("dvr.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("dvr.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_change_poll_ms() -> u64 {
    1_000
}

/// Scheduler timing windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Recordings starting within this window get a session immediately.
    #[serde(default = "default_soon_window_secs")]
    pub soon_window_secs: u64,

    /// How long before the next start the scheduler wakes up.
    #[serde(default = "default_wake_before_start_secs")]
    pub wake_before_start_secs: u64,

    /// Recording starts this long before the scheduled start.
    #[serde(default = "default_lead_ms")]
    pub lead_ms: u64,

    /// Recording stops this long after the scheduled end.
    #[serde(default = "default_trail_ms")]
    pub trail_ms: u64,
}

impl SchedulerConfig {
    pub fn soon_window_ms(&self) -> i64 {
        secs_to_ms(self.soon_window_secs)
    }

    pub fn wake_before_start_ms(&self) -> i64 {
        secs_to_ms(self.wake_before_start_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            soon_window_secs: default_soon_window_secs(),
            wake_before_start_secs: default_wake_before_start_secs(),
            lead_ms: default_lead_ms(),
            trail_ms: default_trail_ms(),
        }
    }
}

fn default_soon_window_secs() -> u64 {
    5 * 60
}

fn default_wake_before_start_secs() -> u64 {
    60
}

fn default_lead_ms() -> u64 {
    5_000
}

fn default_trail_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Finished and failed records are removed this many days after they end.
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,

    /// Interval between retention sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RetentionConfig {
    pub fn keep_ms(&self) -> i64 {
        i64::from(self.keep_days) * 24 * 60 * 60 * 1000
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_days: default_keep_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_keep_days() -> u32 {
    2
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

/// A tuner input, declared as `[[inputs]]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub id: String,

    #[serde(default = "default_tuner_count")]
    pub tuner_count: u32,

    #[serde(default = "default_can_record")]
    pub can_record: bool,
}

impl InputConfig {
    pub fn to_info(&self) -> TunerInputInfo {
        TunerInputInfo {
            id: InputId::new(self.id.clone()),
            tuner_count: self.tuner_count,
            can_record: self.can_record,
        }
    }
}

fn default_tuner_count() -> u32 {
    1
}

fn default_can_record() -> bool {
    true
}

/// A channel, declared as `[[channels]]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub id: i64,
    pub input_id: String,

    #[serde(default)]
    pub display_number: String,

    #[serde(default)]
    pub name: String,
}

impl ChannelConfig {
    pub fn to_channel(&self) -> Channel {
        Channel {
            id: ChannelId(self.id),
            input_id: InputId::new(self.input_id.clone()),
            display_number: self.display_number.clone(),
            name: self.name.clone(),
        }
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.soon_window_ms(), 300_000);
        assert_eq!(cfg.wake_before_start_ms(), 60_000);
        assert_eq!(cfg.lead_ms, 5_000);
        assert_eq!(cfg.trail_ms, 5_000);
    }

    #[test]
    fn retention_default_is_two_days() {
        assert_eq!(RetentionConfig::default().keep_ms(), 2 * 86_400_000);
    }

    #[test]
    fn default_database_path_ends_with_dvr_db() {
        assert!(StorageConfig::default().database_path.ends_with("dvr.db"));
    }

    #[test]
    fn inputs_and_channels_convert() {
        let config = DvrConfig {
            inputs: vec![InputConfig {
                id: "hw0".into(),
                tuner_count: 2,
                can_record: true,
            }],
            channels: vec![ChannelConfig {
                id: 7,
                input_id: "hw0".into(),
                display_number: "7.1".into(),
                name: "Seven".into(),
            }],
            ..Default::default()
        };
        assert_eq!(config.tuner_inputs()[0].tuner_count, 2);
        assert_eq!(config.channel_directory()[0].id, ChannelId(7));
        assert_eq!(config.channel_directory()[0].input_id, InputId::new("hw0"));
    }
}
