// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master password acquisition via TTY prompt or `AGILEKEY_MASTER_PASSWORD`.

use std::io::IsTerminal;

use agilekey_core::{KeychainError, Result};
use secrecy::SecretString;

/// The environment variable name for providing the master password.
pub const MASTER_PASSWORD_ENV_VAR: &str = "AGILEKEY_MASTER_PASSWORD";

/// Get the master password from the environment or an interactive prompt.
///
/// Priority:
/// 1. `AGILEKEY_MASTER_PASSWORD` (for scripts and tests)
/// 2. Interactive TTY prompt via `rpassword`
pub fn get_master_password(prompt: &str) -> Result<SecretString> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    if std::io::stdin().is_terminal() {
        return read_nonempty(prompt).map(SecretString::from);
    }

    Err(no_password())
}

/// Get a new master password, asking twice on a TTY.
///
/// The environment variable is taken as-is without confirmation.
pub fn get_new_master_password() -> Result<SecretString> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    if std::io::stdin().is_terminal() {
        let first = read_nonempty("New master password: ")?;
        let second = read_nonempty("Confirm master password: ")?;
        if first != second {
            return Err(KeychainError::State("passwords do not match".to_string()));
        }
        return Ok(SecretString::from(first));
    }

    Err(no_password())
}

fn password_from_env() -> Option<SecretString> {
    std::env::var(MASTER_PASSWORD_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(SecretString::from)
}

fn read_nonempty(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    let password = rpassword::read_password()
        .map_err(|e| KeychainError::Io(format!("failed to read password: {e}")))?;
    if password.is_empty() {
        return Err(KeychainError::State("empty password not allowed".to_string()));
    }
    Ok(password)
}

fn no_password() -> KeychainError {
    KeychainError::State(format!(
        "no master password provided. Set {MASTER_PASSWORD_ENV_VAR} or run interactively."
    ))
}
