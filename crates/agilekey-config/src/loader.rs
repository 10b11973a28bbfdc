// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/agilekey/agilekey.toml`, then
//! `~/.config/agilekey/agilekey.toml`, then `./agilekey.toml`, with
//! `AGILEKEY_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AgilekeyConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/agilekey/agilekey.toml";
pub const LOCAL_CONFIG_FILE: &str = "agilekey.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agilekey/agilekey.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/agilekey/agilekey.toml`
/// 3. `~/.config/agilekey/agilekey.toml`
/// 4. `./agilekey.toml`
/// 5. `AGILEKEY_*` environment variables
pub fn load_config() -> Result<AgilekeyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files or env vars.
pub fn load_config_from_str(toml_content: &str) -> Result<AgilekeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AgilekeyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AgilekeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AgilekeyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AgilekeyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// `AGILEKEY_VAULT_READ_ONLY` must become `vault.read_only`, not
/// `vault.read.only`, so keys are mapped by section prefix instead of being
/// split on every underscore. The master password variable is not config.
fn env_provider() -> Env {
    Env::prefixed("AGILEKEY_")
        .ignore(&["master_password"])
        .map(|key| {
            key.as_str()
                .to_ascii_lowercase()
                .replacen("vault_", "vault.", 1)
                .replacen("log_", "log.", 1)
                .into()
        })
}
