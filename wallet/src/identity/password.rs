//! # Password Codec
//!
//! Everything the wallet does with the user's password happens here, and
//! none of it involves keeping the password around.
//!
//! - [`PasswordCodec::hash`]: Argon2id with a fresh random salt, emitted as
//!   a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`). This is
//!   what gets persisted.
//! - [`PasswordCodec::verify`]: recomputes and compares in constant time.
//! - [`PasswordCodec::check_strength`]: cheap policy check run *before*
//!   the slow hash, so doomed input never costs 19 MiB of memory-hard work.
//! - [`PasswordCodec::derive_key`]: raw Argon2id output used as the
//!   AES-256-GCM key for the bundle at rest.
//!
//! The stored hash and the encryption key use independent salts. Knowing
//! the PHC string tells you nothing about the bundle key.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{KdfConfig, AES_KEY_LENGTH, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};

/// Errors from hashing or key derivation.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Refusing to hash the empty string.
    #[error("password is empty")]
    Empty,

    /// The configured cost parameters were rejected by argon2.
    #[error("invalid kdf parameters: {0}")]
    Params(String),

    /// Argon2 itself failed (should not happen with valid parameters).
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Argon2id hashing, verification and key derivation with fixed cost
/// parameters.
#[derive(Debug, Clone, Copy)]
pub struct PasswordCodec {
    kdf: KdfConfig,
}

impl Default for PasswordCodec {
    fn default() -> Self {
        Self::new(KdfConfig::default())
    }
}

impl PasswordCodec {
    pub fn new(kdf: KdfConfig) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> KdfConfig {
        self.kdf
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.lanes,
            Some(AES_KEY_LENGTH),
        )
        .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes `password` into a PHC string with a fresh random salt.
    ///
    /// Two calls with the same password yield different strings; both
    /// verify.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::Empty);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Returns `true` iff `password` hashes to `stored_hash`.
    ///
    /// The cost parameters are read from the PHC string, not from this
    /// codec, so hashes made under older settings still verify. A malformed
    /// stored hash is a `false`, not an error.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Password policy: 8..=128 characters, at least one ASCII letter and
    /// one ASCII digit, no whitespace anywhere.
    pub fn check_strength(password: &str) -> bool {
        let len = password.chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
            return false;
        }
        if password.chars().any(char::is_whitespace) {
            return false;
        }
        let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        has_letter && has_digit
    }

    /// Derives the 256-bit bundle encryption key from `password` and `salt`.
    ///
    /// Deterministic: the same password and salt always give the same key.
    pub fn derive_key(
        &self,
        password: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::Empty);
        }
        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        self.argon2()?
            .hash_password_into(password.as_bytes(), salt, key.as_mut())
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(key)
    }
}
