// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/dvr/dvr.toml`, then `~/.config/dvr/dvr.toml`, then
//! `./dvr.toml`, then `DVR_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DvrConfig;

/// Config file name searched in every layer.
pub const CONFIG_FILE_NAME: &str = "dvr.toml";

const SYSTEM_CONFIG_PATH: &str = "/etc/dvr/dvr.toml";

/// Sections that environment variables may address.
const ENV_SECTIONS: &[&str] = &["daemon", "storage", "scheduler", "retention"];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/dvr/dvr.toml`
/// 3. `~/.config/dvr/dvr.toml`
/// 4. `./dvr.toml`
/// 5. `DVR_*` environment variables
pub fn load_config() -> Result<DvrConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (defaults + string, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DvrConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DvrConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DvrConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DvrConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The unextracted hierarchy, for callers that want to inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DvrConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// Candidate config files in merge order, existing or not.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    if let Some(user) = user_config_path() {
        paths.push(user);
    }
    paths.push(
        std::env::current_dir()
            .map(|d| d.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME)),
    );
    paths
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dvr").join(CONFIG_FILE_NAME))
}

/// Maps `DVR_SECTION_KEY` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `DVR_SCHEDULER_SOON_WINDOW_SECS` maps to `scheduler.soon_window_secs`.
fn env_provider() -> Env {
    Env::prefixed("DVR_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.into()
    })
}
