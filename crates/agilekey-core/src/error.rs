// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the agilekey vault engine.

use thiserror::Error;

/// The error type returned by every vault, key agent and filesystem operation.
///
/// Variants carry owned strings rather than boxed sources so that a single
/// failure (for example a failed index flush) can be cloned and reported to
/// every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeychainError {
    /// Malformed on-disk JSON, base64, or `Salted__` framing.
    #[error("format error: {0}")]
    Format(String),

    /// The password failed the validation check while unwrapping a key.
    #[error("incorrect password")]
    IncorrectPassword,

    /// Encrypt/decrypt was requested for a key id that is not resident.
    #[error("no key with id `{id}` is loaded in the key agent")]
    UnknownKey { id: String },

    /// No resident key matches an item's declared security level.
    #[error("no unlocked key found for security level `{level}`")]
    MissingKey { level: String },

    /// A conditional write found a different revision than expected.
    #[error("write conflict on `{path}`: file was modified since it was read")]
    Conflict { path: String },

    /// The requested file does not exist.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// The operation is not valid in the current vault state.
    #[error("invalid state: {0}")]
    State(String),

    /// Ciphertext could not be decrypted (bad padding or truncated blocks).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Underlying I/O failure other than a missing file.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeychainError {
    /// Returns true for [`KeychainError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`KeychainError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true for [`KeychainError::IncorrectPassword`].
    pub fn is_incorrect_password(&self) -> bool {
        matches!(self, Self::IncorrectPassword)
    }
}

impl From<serde_json::Error> for KeychainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("invalid JSON: {err}"))
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KeychainError>;
