//! # AES-256-GCM Sealing
//!
//! Authenticated encryption for the key bundle at rest. The identity store
//! derives a 256-bit key from the user's password (see
//! [`crate::identity::password`]) and seals the serialized bundle with it.
//!
//! ## Nonce management
//!
//! Every seal draws a fresh random 96-bit nonce from the OS CSPRNG. The
//! bundle is re-sealed on every mutation, which for a wallet means a few
//! hundred times over its life; the 2^48 birthday bound is not a concern.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext || tag` as one buffer and [`open`]
//! expects the same layout.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH};

/// Errors that can occur while sealing or opening.
///
/// Deliberately vague: "wrong password" and "corrupted file" look the same
/// from the outside.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {} bytes", AES_NONCE_LENGTH + AES_TAG_LENGTH)]
    CiphertextTooShort,
}

/// Encrypts `plaintext` under `key` with a random nonce.
///
/// # Example
///
/// ```
/// use fuse_wallet::crypto::encryption::{open, seal};
///
/// let key = [0x42u8; 32];
/// let sealed = seal(&key, b"account bundle").unwrap();
/// assert_eq!(open(&key, &sealed).unwrap(), b"account bundle");
/// ```
pub fn seal(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a buffer produced by [`seal`].
///
/// Fails with [`EncryptionError::DecryptFailed`] on a wrong key or any
/// modification of the buffer. We don't say which.
pub fn open(key: &[u8; AES_KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH + AES_TAG_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let sealed = seal(&key, b"mnemonic and friends").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"mnemonic and friends");
    }

    #[test]
    fn test_sealed_length() {
        let key = test_key();
        let sealed = seal(&key, b"").unwrap();
        assert_eq!(sealed.len(), AES_NONCE_LENGTH + AES_TAG_LENGTH);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_key();
        let sealed = seal(&key, b"secret").unwrap();
        let mut wrong = key;
        wrong[0] ^= 0xFF;
        assert!(matches!(open(&wrong, &sealed), Err(EncryptionError::DecryptFailed)));
    }

    #[test]
    fn test_tampering_detected() {
        let key = test_key();
        let mut sealed = seal(&key, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn test_nonces_differ() {
        let key = test_key();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(&a[..AES_NONCE_LENGTH], &b[..AES_NONCE_LENGTH]);
    }

    #[test]
    fn test_truncated_input_rejected() {
        let key = test_key();
        assert!(matches!(
            open(&key, &[0u8; 10]),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }
}
