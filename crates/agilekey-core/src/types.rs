// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the filesystem and key agent interfaces.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Metadata returned by [`crate::VaultFs::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path of the file relative to the filesystem root.
    pub path: String,
    /// Opaque revision marker. Changes whenever the file content changes.
    pub revision: String,
    /// Size of the file in bytes.
    pub size: u64,
}

/// Options for [`crate::VaultFs::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// When set, the write only succeeds if the stored file is still at
    /// this revision.
    pub parent_revision: Option<String>,
}

impl WriteOptions {
    /// Options for a write conditioned on `revision`.
    pub fn with_parent(revision: impl Into<String>) -> Self {
        Self {
            parent_revision: Some(revision.into()),
        }
    }
}

/// Encryption scheme used by the key agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum CryptoAlgorithm {
    /// AES-128-CBC keyed via OpenSSL's `EVP_BytesToKey` from the stored key
    /// and an 8-byte salt, in `Salted__` framing.
    #[strum(serialize = "aes128-openssl-key")]
    #[serde(rename = "aes128-openssl-key")]
    Aes128OpenSslKey,
}

/// Parameters passed alongside every key agent encrypt/decrypt call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoParams {
    pub algorithm: CryptoAlgorithm,
}

impl CryptoParams {
    pub fn new(algorithm: CryptoAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl Default for CryptoParams {
    fn default() -> Self {
        Self::new(CryptoAlgorithm::Aes128OpenSslKey)
    }
}

/// Origin of a change being saved to a vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum ChangeSource {
    /// An edit made locally by the user.
    #[default]
    Local,
    /// A change replicated from another store. Timestamps are preserved.
    Sync,
}
