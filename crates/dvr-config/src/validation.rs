// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::DvrConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &DvrConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }

    if !LOG_LEVELS.contains(&config.daemon.log_level.as_str()) {
        errors.push(validation(format!(
            "daemon.log_level `{}` must be one of {}",
            config.daemon.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.scheduler.soon_window_secs == 0 {
        errors.push(validation("scheduler.soon_window_secs must be positive"));
    }

    if config.scheduler.wake_before_start_secs > config.scheduler.soon_window_secs {
        errors.push(validation(format!(
            "scheduler.wake_before_start_secs ({}) must not exceed scheduler.soon_window_secs ({})",
            config.scheduler.wake_before_start_secs, config.scheduler.soon_window_secs
        )));
    }

    if config.retention.sweep_interval_secs == 0 {
        errors.push(validation("retention.sweep_interval_secs must be positive"));
    }

    let mut input_ids = HashSet::new();
    for input in &config.inputs {
        if input.id.trim().is_empty() {
            errors.push(validation("inputs.id must not be empty"));
        }
        if !input_ids.insert(input.id.as_str()) {
            errors.push(validation(format!("duplicate input id `{}`", input.id)));
        }
        if input.tuner_count == 0 {
            errors.push(validation(format!(
                "input `{}` must have a tuner_count of at least 1",
                input.id
            )));
        }
    }

    let mut channel_ids = HashSet::new();
    for channel in &config.channels {
        if !channel_ids.insert(channel.id) {
            errors.push(validation(format!("duplicate channel id {}", channel.id)));
        }
        if !input_ids.contains(channel.input_id.as_str()) {
            errors.push(validation(format!(
                "channel {} references unknown input `{}`",
                channel.id, channel.input_id
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelConfig, InputConfig};

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&DvrConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = DvrConfig::default();
        config.storage.database_path = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn bad_log_level_fails_validation() {
        let mut config = DvrConfig::default();
        config.daemon.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "log_level"));
    }

    #[test]
    fn wake_margin_larger_than_window_fails() {
        let mut config = DvrConfig::default();
        config.scheduler.soon_window_secs = 30;
        config.scheduler.wake_before_start_secs = 60;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "wake_before_start_secs"));
    }

    #[test]
    fn channel_with_unknown_input_fails() {
        let mut config = DvrConfig::default();
        config.channels.push(ChannelConfig {
            id: 1,
            input_id: "missing".into(),
            display_number: "1".into(),
            name: "One".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "unknown input `missing`"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = DvrConfig::default();
        config.storage.database_path = String::new();
        config.inputs = vec![
            InputConfig {
                id: "hw0".into(),
                tuner_count: 0,
                can_record: true,
            },
            InputConfig {
                id: "hw0".into(),
                tuner_count: 1,
                can_record: true,
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "duplicate input id"));
        assert!(has_message(&errors, "tuner_count"));
    }
}
