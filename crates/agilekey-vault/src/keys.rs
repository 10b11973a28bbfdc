// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wrapping and unwrapping of vault master keys with the master password.
//!
//! A master key is 1024 random bytes. On disk it is stored as:
//! - `data`: `Salted__ || salt || AES-128-CBC(pbkdf2(password, salt), key)`
//! - `validation`: a `Salted__` blob of the key encrypted with itself as the
//!   OpenSSL password, so a decrypted candidate can be checked.

use agilekey_core::{KeychainError, Result};
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::{
    self, SALT_LEN, decrypt_legacy, encrypt_legacy, extract_salt_and_ciphertext, frame_salted,
};
use crate::format::{EncryptionKeyEntry, decode_base64, encode_base64};
use crate::kdf::derive_key;

/// Length in bytes of a newly generated master key.
pub const MASTER_KEY_LEN: usize = 1024;

/// A master key decrypted from the key file.
pub struct UnlockedKey {
    pub identifier: String,
    pub level: String,
    pub key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("identifier", &self.identifier)
            .field("level", &self.level)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A master key encrypted under a password, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Base64 `Salted__` blob of the key under the password-derived key.
    pub data: String,
    /// Base64 `Salted__` blob of the key under itself.
    pub validation: String,
    pub salt: [u8; SALT_LEN],
    pub iterations: u32,
}

impl WrappedKey {
    pub fn into_entry(self, identifier: &str, level: &str) -> EncryptionKeyEntry {
        EncryptionKeyEntry {
            data: self.data,
            identifier: identifier.to_string(),
            iterations: self.iterations,
            level: level.to_string(),
            validation: self.validation,
        }
    }
}

/// Generate a fresh master key and wrap it with `password`.
pub fn new_key_entry(
    password: &[u8],
    level: &str,
    iterations: u32,
) -> Result<(EncryptionKeyEntry, Zeroizing<Vec<u8>>)> {
    let raw_key = Zeroizing::new(crypto::random_bytes(MASTER_KEY_LEN)?);
    let entry = wrap_key(password, &raw_key, iterations)?.into_entry(&crypto::new_uuid(), level);
    Ok((entry, raw_key))
}

/// Encrypt `raw_key` with a key derived from `password`.
pub fn wrap_key(password: &[u8], raw_key: &[u8], iterations: u32) -> Result<WrappedKey> {
    let salt: [u8; SALT_LEN] = crypto::random_array()?;
    let derived = derive_key(password, &salt, iterations)?;
    let ciphertext = encrypt_legacy(&derived.key, &derived.iv, raw_key);
    let validation = crypto::encrypt_salted(raw_key, raw_key)?;

    Ok(WrappedKey {
        data: encode_base64(&frame_salted(&salt, &ciphertext)),
        validation: encode_base64(&validation),
        salt,
        iterations,
    })
}

/// Decrypt the master key held in `entry`.
///
/// Returns [`KeychainError::IncorrectPassword`] when decryption or the
/// validation check fails, and [`KeychainError::Format`] when the entry
/// itself is malformed.
pub fn unwrap_key(password: &[u8], entry: &EncryptionKeyEntry) -> Result<Zeroizing<Vec<u8>>> {
    let data = decode_base64("data", &entry.data)?;
    let validation = decode_base64("validation", &entry.validation)?;
    let parts = extract_salt_and_ciphertext(&data)?;

    let derived = derive_key(password, &parts.salt, entry.iterations)?;
    let candidate = Zeroizing::new(
        decrypt_legacy(&derived.key, &derived.iv, parts.ciphertext)
            .map_err(|_| KeychainError::IncorrectPassword)?,
    );

    let expected = Zeroizing::new(
        crypto::decrypt_salted(&candidate, &validation).map_err(|e| match e {
            KeychainError::Decryption(_) => KeychainError::IncorrectPassword,
            other => other,
        })?,
    );

    if !bool::from(candidate.as_slice().ct_eq(expected.as_slice())) {
        return Err(KeychainError::IncorrectPassword);
    }
    Ok(candidate)
}

/// Re-encrypt `entry` under `new_password`, keeping its identifier and level.
///
/// Uses the entry's own iteration count unless `iterations` is given.
pub fn rewrap_key(
    old_password: &[u8],
    new_password: &[u8],
    entry: &EncryptionKeyEntry,
    iterations: Option<u32>,
) -> Result<EncryptionKeyEntry> {
    let raw_key = unwrap_key(old_password, entry)?;
    let iterations = iterations.unwrap_or(entry.iterations);
    Ok(wrap_key(new_password, &raw_key, iterations)?.into_entry(&entry.identifier, &entry.level))
}

/// Unwrap every entry, skipping the given legacy levels.
pub fn decrypt_keys(
    password: &[u8],
    entries: &[EncryptionKeyEntry],
    skip_levels: &[&str],
) -> Result<Vec<UnlockedKey>> {
    let mut unlocked = Vec::with_capacity(entries.len());
    for entry in entries {
        if skip_levels.contains(&entry.level.as_str()) {
            warn!(level = %entry.level, id = %entry.identifier, "skipping legacy key");
            continue;
        }
        let key = unwrap_key(password, entry)?;
        unlocked.push(UnlockedKey {
            identifier: entry.identifier.clone(),
            level: entry.level.clone(),
            key,
        });
    }
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERATIONS: u32 = 10;

    #[test]
    fn wrapped_key_unwraps_with_same_password() {
        let (entry, raw_key) = new_key_entry(b"correct horse", "SL5", ITERATIONS).unwrap();
        assert_eq!(raw_key.len(), MASTER_KEY_LEN);
        assert_eq!(entry.level, "SL5");
        assert_eq!(entry.iterations, ITERATIONS);
        assert_eq!(entry.identifier.len(), 32);

        let unwrapped = unwrap_key(b"correct horse", &entry).unwrap();
        assert_eq!(unwrapped.as_slice(), raw_key.as_slice());
    }

    #[test]
    fn wrapped_key_data_is_salted_blob() {
        let (entry, _) = new_key_entry(b"pw", "SL5", ITERATIONS).unwrap();
        let data = decode_base64("data", &entry.data).unwrap();
        assert_eq!(&data[..8], b"Salted__");
        // 1024 bytes plus a full block of padding.
        assert_eq!(data.len(), 16 + MASTER_KEY_LEN + 16);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (entry, _) = new_key_entry(b"right", "SL5", ITERATIONS).unwrap();
        let err = unwrap_key(b"wrong", &entry).unwrap_err();
        assert!(err.is_incorrect_password());
    }

    #[test]
    fn tampered_validation_is_rejected() {
        let (mut entry, _) = new_key_entry(b"pw", "SL5", ITERATIONS).unwrap();
        let (other, _) = new_key_entry(b"pw", "SL5", ITERATIONS).unwrap();
        entry.validation = other.validation;
        assert!(unwrap_key(b"pw", &entry).unwrap_err().is_incorrect_password());
    }

    #[test]
    fn malformed_entry_is_a_format_error() {
        let (mut entry, _) = new_key_entry(b"pw", "SL5", ITERATIONS).unwrap();
        entry.data = encode_base64(b"short");
        assert!(matches!(
            unwrap_key(b"pw", &entry),
            Err(KeychainError::Format(_))
        ));

        entry.data = "***".to_string();
        assert!(matches!(
            unwrap_key(b"pw", &entry),
            Err(KeychainError::Format(_))
        ));
    }

    #[test]
    fn rewrap_keeps_identity_and_key_material() {
        let (entry, raw_key) = new_key_entry(b"old", "SL5", ITERATIONS).unwrap();
        let rewrapped = rewrap_key(b"old", b"new", &entry, Some(ITERATIONS + 1)).unwrap();

        assert_eq!(rewrapped.identifier, entry.identifier);
        assert_eq!(rewrapped.level, entry.level);
        assert_eq!(rewrapped.iterations, ITERATIONS + 1);
        assert_eq!(
            unwrap_key(b"new", &rewrapped).unwrap().as_slice(),
            raw_key.as_slice()
        );
        assert!(unwrap_key(b"old", &rewrapped).is_err());
    }

    #[test]
    fn rewrap_defaults_to_entry_iterations() {
        let (entry, _) = new_key_entry(b"old", "SL3", ITERATIONS).unwrap();
        let rewrapped = rewrap_key(b"old", b"new", &entry, None).unwrap();
        assert_eq!(rewrapped.iterations, ITERATIONS);
        assert_eq!(rewrapped.level, "SL3");
    }

    #[test]
    fn wrapped_key_salt_matches_data_header() {
        let wrapped = wrap_key(b"pw", &[5u8; 32], ITERATIONS).unwrap();
        let data = decode_base64("data", &wrapped.data).unwrap();
        assert_eq!(&data[8..16], &wrapped.salt);
    }

    #[test]
    fn rewrap_with_wrong_old_password_fails() {
        let (entry, _) = new_key_entry(b"old", "SL5", ITERATIONS).unwrap();
        let err = rewrap_key(b"nope", b"new", &entry, None).unwrap_err();
        assert!(err.is_incorrect_password());
    }

    #[test]
    #[tracing_test::traced_test]
    fn decrypt_keys_skips_requested_levels() {
        let (sl5, _) = new_key_entry(b"pw", "SL5", ITERATIONS).unwrap();
        let (mut sl3, _) = new_key_entry(b"pw", "SL3", ITERATIONS).unwrap();
        // An undecryptable SL3 entry must not break unlocking.
        sl3.data = encode_base64(b"Salted__garbage!");

        let keys = decrypt_keys(b"pw", &[sl5.clone(), sl3], &["SL3"]).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].identifier, sl5.identifier);
        assert_eq!(keys[0].level, "SL5");
        assert!(format!("{:?}", keys[0]).contains("REDACTED"));
        assert!(logs_contain("skipping legacy key"));
    }
}
