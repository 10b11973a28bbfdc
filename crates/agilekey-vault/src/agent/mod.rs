// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key agents: holders of unlocked master keys.
//!
//! [`SimpleKeyAgent`] keeps keys in process memory. [`rpc::RpcKeyAgent`]
//! forwards calls over a channel to an agent owned by another task.

pub mod rpc;

use std::collections::BTreeMap;

use agilekey_core::{CryptoAlgorithm, CryptoParams, KeyAgent, KeychainError, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto;

/// In-memory key agent.
///
/// Key bytes are zeroized when removed or when the agent is dropped.
#[derive(Default)]
pub struct SimpleKeyAgent {
    keys: RwLock<BTreeMap<String, Zeroizing<Vec<u8>>>>,
}

impl SimpleKeyAgent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for SimpleKeyAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.keys.try_read().map(|k| k.len()).ok();
        f.debug_struct("SimpleKeyAgent")
            .field("keys", &count.map_or("<locked>".to_string(), |n| format!("[{n} REDACTED]")))
            .finish()
    }
}

#[async_trait]
impl KeyAgent for SimpleKeyAgent {
    async fn add_key(&self, id: &str, key: Vec<u8>) -> Result<()> {
        debug!(id, "adding key to agent");
        self.keys
            .write()
            .await
            .insert(id.to_string(), Zeroizing::new(key));
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.keys.read().await.keys().cloned().collect())
    }

    async fn forget_keys(&self) -> Result<()> {
        let mut keys = self.keys.write().await;
        debug!(count = keys.len(), "forgetting agent keys");
        keys.clear();
        Ok(())
    }

    async fn encrypt(&self, id: &str, plaintext: &[u8], params: CryptoParams) -> Result<Vec<u8>> {
        let keys = self.keys.read().await;
        let key = keys
            .get(id)
            .ok_or_else(|| KeychainError::UnknownKey { id: id.to_string() })?;
        match params.algorithm {
            CryptoAlgorithm::Aes128OpenSslKey => crypto::encrypt_salted(key, plaintext),
        }
    }

    async fn decrypt(&self, id: &str, ciphertext: &[u8], params: CryptoParams) -> Result<Vec<u8>> {
        let keys = self.keys.read().await;
        let key = keys
            .get(id)
            .ok_or_else(|| KeychainError::UnknownKey { id: id.to_string() })?;
        match params.algorithm {
            CryptoAlgorithm::Aes128OpenSslKey => crypto::decrypt_salted(key, ciphertext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encrypt_decrypt_with_resident_key() {
        let agent = SimpleKeyAgent::new();
        agent.add_key("K1", vec![42u8; 64]).await.unwrap();

        let params = CryptoParams::default();
        let ciphertext = agent.encrypt("K1", b"top secret", params).await.unwrap();
        assert_eq!(&ciphertext[..8], b"Salted__");
        let plaintext = agent.decrypt("K1", &ciphertext, params).await.unwrap();
        assert_eq!(plaintext, b"top secret");
    }

    #[tokio::test]
    async fn ciphertext_is_openssl_compatible() {
        let agent = SimpleKeyAgent::new();
        agent.add_key("K1", b"the master key".to_vec()).await.unwrap();

        let ciphertext = agent
            .encrypt("K1", b"payload", CryptoParams::default())
            .await
            .unwrap();
        assert_eq!(
            crypto::decrypt_salted(b"the master key", &ciphertext).unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn unknown_key_is_reported() {
        let agent = SimpleKeyAgent::new();
        let err = agent
            .encrypt("missing", b"x", CryptoParams::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            KeychainError::UnknownKey {
                id: "missing".into()
            }
        );
        assert!(agent.decrypt("missing", b"x", CryptoParams::default()).await.is_err());
    }

    #[tokio::test]
    async fn list_keys_is_sorted_and_forget_clears() {
        let agent = SimpleKeyAgent::new();
        agent.add_key("B", vec![1]).await.unwrap();
        agent.add_key("A", vec![2]).await.unwrap();
        assert_eq!(agent.list_keys().await.unwrap(), vec!["A", "B"]);

        agent.forget_keys().await.unwrap();
        assert!(agent.list_keys().await.unwrap().is_empty());
        // Forgetting twice is harmless.
        agent.forget_keys().await.unwrap();
    }

    #[tokio::test]
    async fn add_key_replaces_existing_id() {
        let agent = SimpleKeyAgent::new();
        agent.add_key("K", b"first".to_vec()).await.unwrap();
        let ciphertext = agent.encrypt("K", b"msg", CryptoParams::default()).await.unwrap();

        agent.add_key("K", b"second".to_vec()).await.unwrap();
        assert_eq!(agent.list_keys().await.unwrap().len(), 1);
        // Decrypting with the replacement key either fails or yields garbage.
        let result = agent.decrypt("K", &ciphertext, CryptoParams::default()).await;
        assert!(result.map(|p| p != b"msg").unwrap_or(true));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let agent = SimpleKeyAgent::new();
        let debug = format!("{agent:?}");
        assert!(debug.contains("REDACTED"));
    }
}
