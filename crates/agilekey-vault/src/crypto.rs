// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-128-CBC and OpenSSL-compatible salted encryption.
//!
//! Blobs produced by [`encrypt_salted`] use the framing written by
//! `openssl enc -aes-128-cbc -md md5`: the ASCII marker `Salted__`, an
//! 8-byte salt, then the ciphertext. The AES key and IV are derived from the
//! password and salt with a single round of `EVP_BytesToKey` (MD5).

use aes::Aes128;
use agilekey_core::{KeychainError, Result};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Marker at the start of every salted blob.
pub const SALTED_PREFIX: &[u8; 8] = b"Salted__";

/// Length of the salt that follows [`SALTED_PREFIX`].
pub const SALT_LEN: usize = 8;

/// A salted blob split into its salt and ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltedBlob<'a> {
    pub salt: [u8; SALT_LEN],
    pub ciphertext: &'a [u8],
}

/// Encrypt with AES-128-CBC and PKCS#7 padding.
pub fn encrypt_legacy(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(&(*key).into(), &(*iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-128-CBC ciphertext and strip PKCS#7 padding.
///
/// A wrong key usually shows up here as a padding error, but not always:
/// roughly one in 256 wrong keys yields valid-looking padding.
pub fn decrypt_legacy(key: &[u8; 16], iv: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aes128CbcDec::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            KeychainError::Decryption("invalid padding or truncated ciphertext".to_string())
        })
}

/// OpenSSL `EVP_BytesToKey` with MD5 and one iteration, for a 128-bit key.
///
/// Returns `(key, iv)` where `key = MD5(password || salt)` and
/// `iv = MD5(key || password || salt)`.
pub fn openssl_key(password: &[u8], salt: &[u8]) -> ([u8; 16], [u8; 16]) {
    let mut input = Zeroizing::new(Vec::with_capacity(password.len() + salt.len()));
    input.extend_from_slice(password);
    input.extend_from_slice(salt);
    let key = md5::compute(input.as_slice());

    let mut second = Zeroizing::new(Vec::with_capacity(16 + input.len()));
    second.extend_from_slice(&key.0);
    second.extend_from_slice(&input);
    let iv = md5::compute(second.as_slice());

    (key.0, iv.0)
}

/// Encrypt `plaintext` into a `Salted__` blob keyed from `password`.
///
/// A fresh random salt is generated for every call.
pub fn encrypt_salted(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let salt: [u8; SALT_LEN] = random_array()?;
    Ok(encrypt_salted_with(password, &salt, plaintext))
}

/// Encrypt into a `Salted__` blob with a caller-chosen salt.
pub fn encrypt_salted_with(password: &[u8], salt: &[u8; SALT_LEN], plaintext: &[u8]) -> Vec<u8> {
    let (key, iv) = openssl_key(password, salt);
    let ciphertext = encrypt_legacy(&key, &iv, plaintext);
    frame_salted(salt, &ciphertext)
}

/// Decrypt a `Salted__` blob keyed from `password`.
pub fn decrypt_salted(password: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    let parts = extract_salt_and_ciphertext(blob)?;
    let (key, iv) = openssl_key(password, &parts.salt);
    decrypt_legacy(&key, &iv, parts.ciphertext)
}

/// Build `Salted__ || salt || ciphertext`.
pub fn frame_salted(salt: &[u8; SALT_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(SALTED_PREFIX.len() + SALT_LEN + ciphertext.len());
    blob.extend_from_slice(SALTED_PREFIX);
    blob.extend_from_slice(salt);
    blob.extend_from_slice(ciphertext);
    blob
}

/// Split a `Salted__` blob into salt and ciphertext.
pub fn extract_salt_and_ciphertext(blob: &[u8]) -> Result<SaltedBlob<'_>> {
    let header_len = SALTED_PREFIX.len() + SALT_LEN;
    if blob.len() < header_len {
        return Err(KeychainError::Format(format!(
            "salted blob too short ({} bytes, need at least {header_len})",
            blob.len()
        )));
    }
    if &blob[..SALTED_PREFIX.len()] != SALTED_PREFIX {
        return Err(KeychainError::Format(
            "salted blob is missing the `Salted__` marker".to_string(),
        ));
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&blob[SALTED_PREFIX.len()..header_len]);
    Ok(SaltedBlob {
        salt,
        ciphertext: &blob[header_len..],
    })
}

/// Generate `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| KeychainError::Internal("failed to generate random bytes".to_string()))?;
    Ok(bytes)
}

pub(crate) fn random_array<const N: usize>() -> Result<[u8; N]> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|_| KeychainError::Internal("failed to generate random bytes".to_string()))?;
    Ok(bytes)
}

/// Generate a new item or key identifier: 32 uppercase hex digits.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}
