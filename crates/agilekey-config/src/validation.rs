// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::AgilekeyConfig;

/// Smallest accepted PBKDF2 iteration count.
pub const MIN_ITERATIONS: u32 = 1000;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &AgilekeyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vault.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.path must not be empty".to_string(),
        });
    }

    if config.vault.iterations < MIN_ITERATIONS {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.iterations must be at least {MIN_ITERATIONS}, got {}",
                config.vault.iterations
            ),
        });
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
