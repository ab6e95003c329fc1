// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lookalike.toml` > `~/.config/lookalike/lookalike.toml` >
//! `/etc/lookalike/lookalike.toml` with environment variable overrides via `LOOKALIKE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LookalikeConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/lookalike/lookalike.toml";
pub(crate) const LOCAL_CONFIG: &str = "lookalike.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lookalike/lookalike.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lookalike/lookalike.toml` (system-wide)
/// 3. `~/.config/lookalike/lookalike.toml` (user XDG config)
/// 4. `./lookalike.toml` (local directory)
/// 5. `LOOKALIKE_*` environment variables
pub fn load_config() -> Result<LookalikeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LookalikeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LookalikeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LookalikeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LookalikeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LookalikeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: key names contain
/// underscores, so `LOOKALIKE_STORAGE_DATABASE_PATH` must become
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("LOOKALIKE_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("storage_", "storage.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
