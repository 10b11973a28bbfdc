// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2 key derivation from the master password.
//!
//! Derives 32 bytes with PBKDF2-HMAC-SHA1. The first half is the AES-128
//! key and the second half is the CBC initialization vector used to wrap
//! the vault's master key.

use std::num::NonZeroU32;

use agilekey_core::{KeychainError, Result};
use ring::pbkdf2;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Default number of PBKDF2 iterations used to protect a new master key.
///
/// Taken from the 1Password v4 app for Mac as of May 2014.
pub const DEFAULT_VAULT_PASS_ITERATIONS: u32 = 80_000;

/// An AES-128 key and IV derived from a password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Derive an AES-128 key and IV from `password` and `salt`.
///
/// Fails with [`KeychainError::Format`] if `iterations` is zero, which can
/// only come from a corrupt key file.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
        KeychainError::Format("key derivation iteration count must be non-zero".to_string())
    })?;

    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA1,
        iterations,
        salt,
        password,
        output.as_mut(),
    );

    let mut derived = DerivedKey {
        key: [0u8; 16],
        iv: [0u8; 16],
    };
    derived.key.copy_from_slice(&output[..16]);
    derived.iv.copy_from_slice(&output[16..]);
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_matches_rfc6070_vectors() {
        // PBKDF2-HMAC-SHA1("password", "salt"), extended to 32 bytes.
        let one = derive_key(b"password", b"salt", 1).unwrap();
        assert_eq!(hex::encode(one.key), "0c60c80f961f0e71f3a9b524af601206");
        assert_eq!(hex::encode(one.iv), "2fe037a6e0f0eb94fe8fc46bdc637164");

        let two = derive_key(b"password", b"salt", 2).unwrap();
        assert_eq!(hex::encode(two.key), "ea6c014dc72d6f8ccd1ed92ace1d41f0");
    }

    #[test]
    fn derive_key_produces_consistent_output() {
        let salt = [1u8; 8];
        let key1 = derive_key(b"test passphrase", &salt, 10).unwrap();
        let key2 = derive_key(b"test passphrase", &salt, 10).unwrap();

        assert_eq!(key1.key, key2.key);
        assert_eq!(key1.iv, key2.iv);
    }

    #[test]
    fn derive_key_different_salt_produces_different_output() {
        let key1 = derive_key(b"same passphrase", &[1u8; 8], 10).unwrap();
        let key2 = derive_key(b"same passphrase", &[2u8; 8], 10).unwrap();

        assert_ne!(key1.key, key2.key);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let result = derive_key(b"test", &[0u8; 8], 0);
        assert!(matches!(result, Err(KeychainError::Format(_))));
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = derive_key(b"test", &[0u8; 8], 1).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("12, 96"));
    }
}
