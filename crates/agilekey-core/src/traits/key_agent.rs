// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key agent trait: the narrow encrypt/decrypt surface over unlocked keys.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CryptoParams;

/// Holds decrypted vault keys in memory and performs crypto with them.
///
/// Keys never leave the agent once added. Implementations may live in the
/// same process or behind a call/reply channel.
#[async_trait]
pub trait KeyAgent: Send + Sync + 'static {
    /// Registers `key` under `id`, replacing any existing key with that id.
    async fn add_key(&self, id: &str, key: Vec<u8>) -> Result<()>;

    /// Returns the ids of all resident keys in sorted order.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Drops every resident key. Calling this on an empty agent is a no-op.
    async fn forget_keys(&self) -> Result<()>;

    /// Encrypts `plaintext` with the key `id`.
    ///
    /// Fails with [`crate::KeychainError::UnknownKey`] if `id` is not resident.
    async fn encrypt(&self, id: &str, plaintext: &[u8], params: CryptoParams) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` with the key `id`.
    ///
    /// Fails with [`crate::KeychainError::UnknownKey`] if `id` is not resident.
    async fn decrypt(&self, id: &str, ciphertext: &[u8], params: CryptoParams)
    -> Result<Vec<u8>>;
}
