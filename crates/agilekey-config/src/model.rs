// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level agilekey configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgilekeyConfig {
    /// Vault location and key protection settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Vault configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Path of the `.agilekeychain` directory.
    #[serde(default = "default_vault_path")]
    pub path: String,

    /// PBKDF2 iterations used when creating a vault or changing its password.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Open the vault without allowing writes.
    #[serde(default)]
    pub read_only: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            iterations: default_iterations(),
            read_only: false,
        }
    }
}

fn default_vault_path() -> String {
    "vault.agilekeychain".to_string()
}

fn default_iterations() -> u32 {
    80_000
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
