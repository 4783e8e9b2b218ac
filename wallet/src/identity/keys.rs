//! # Key Material & the Private Key Bundle
//!
//! An account in the wallet is one Ed25519 key. That key comes from one of
//! two places:
//!
//! - a **mnemonic** plus a subaccount index, derived with SLIP-0010 along
//!   `m/44'/223'/0'/0'/<index>'` (every component hardened, because
//!   Ed25519 has no public-parent derivation), or
//! - a **raw 32-byte private key** imported as-is.
//!
//! [`KeyMaterial`] records which, and [`PrivateKeyBundle`] is the ordered
//! collection of accounts that the identity store seals and persists as a
//! single blob.
//!
//! ## Secret hygiene
//!
//! `KeyMaterial` and `PrivateKeyBundle` zeroize their secrets on drop and
//! print `[redacted]` in their `Debug` output. Intermediate SLIP-0010 keys
//! and chain codes are wiped as soon as the next level is computed.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use super::mnemonic::{self, MnemonicError};
use super::principal::Principal;
use super::IdentityError;
use crate::config::{DEFAULT_ACCOUNT_ICON, DERIVATION_PREFIX, PRIVATE_KEY_LENGTH};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

const SLIP10_ED25519_KEY: &[u8] = b"ed25519 seed";

/// Errors from turning key material into a signing key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),

    /// Hardened derivation only covers indices below 2^31.
    #[error("subaccount index {0} is out of range")]
    IndexOutOfRange(u32),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("hmac failure during key derivation")]
    Hmac,
}

// ---------------------------------------------------------------------------
// SLIP-0010
// ---------------------------------------------------------------------------

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>, KeyError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| KeyError::Hmac)?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Derives the Ed25519 secret at `path` (indices without the hardened bit)
/// from a BIP39 seed.
fn slip10_derive(seed: &[u8], path: &[u32]) -> Result<Zeroizing<[u8; 32]>, KeyError> {
    let i = hmac_sha512(SLIP10_ED25519_KEY, seed)?;
    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&i[..32]);
    chain_code.copy_from_slice(&i[32..]);

    let mut data = Zeroizing::new([0u8; 37]);
    for &index in path {
        if index >= HARDENED_OFFSET {
            return Err(KeyError::IndexOutOfRange(index));
        }
        data[1..33].copy_from_slice(&key[..]);
        data[33..].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

        let i = hmac_sha512(&chain_code[..], &data[..])?;
        key.copy_from_slice(&i[..32]);
        chain_code.copy_from_slice(&i[32..]);
    }
    Ok(key)
}

/// Full derivation path for account `index`.
pub fn derivation_path(index: u32) -> [u32; 5] {
    let [purpose, coin, account, change] = DERIVATION_PREFIX;
    [purpose, coin, account, change, index]
}

// ---------------------------------------------------------------------------
// KeyMaterial
// ---------------------------------------------------------------------------

/// The secret an account is derived from.
#[derive(Clone, Serialize, Deserialize)]
pub enum KeyMaterial {
    /// BIP39 phrase plus the final hardened index of the derivation path.
    Mnemonic { phrase: String, subaccount: u32 },
    /// A raw Ed25519 secret key.
    PrivateKey { bytes: [u8; PRIVATE_KEY_LENGTH] },
}

impl KeyMaterial {
    pub fn mnemonic(phrase: &str, subaccount: u32) -> Self {
        Self::Mnemonic {
            phrase: mnemonic::normalize(phrase),
            subaccount,
        }
    }

    /// Parses a hex-encoded 32-byte secret (an optional `0x` prefix is
    /// tolerated).
    pub fn private_key_hex(text: &str) -> Result<Self, KeyError> {
        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let decoded = Zeroizing::new(
            hex::decode(trimmed).map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?,
        );
        let bytes: [u8; PRIVATE_KEY_LENGTH] = decoded.as_slice().try_into().map_err(|_| {
            KeyError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_LENGTH,
                decoded.len()
            ))
        })?;
        Ok(Self::PrivateKey { bytes })
    }

    /// `true` if both describe the same key. Phrases compare normalised.
    pub fn same_material(&self, other: &KeyMaterial) -> bool {
        match (self, other) {
            (
                Self::Mnemonic { phrase: a, subaccount: i },
                Self::Mnemonic { phrase: b, subaccount: j },
            ) => i == j && mnemonic::normalize(a) == mnemonic::normalize(b),
            (Self::PrivateKey { bytes: a }, Self::PrivateKey { bytes: b }) => a == b,
            _ => false,
        }
    }

    /// Turns the material into a usable signing key.
    pub fn derive(&self) -> Result<DerivedKey, KeyError> {
        match self {
            Self::Mnemonic { phrase, subaccount } => {
                let seed = mnemonic::to_seed(phrase)?;
                let secret = slip10_derive(&seed[..], &derivation_path(*subaccount))?;
                Ok(DerivedKey::from_secret(&secret))
            }
            Self::PrivateKey { bytes } => Ok(DerivedKey::from_secret(bytes)),
        }
    }
}

impl Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        match self {
            Self::Mnemonic { phrase, .. } => phrase.zeroize(),
            Self::PrivateKey { bytes } => bytes.zeroize(),
        }
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mnemonic { subaccount, .. } => f
                .debug_struct("Mnemonic")
                .field("phrase", &"[redacted]")
                .field("subaccount", subaccount)
                .finish(),
            Self::PrivateKey { .. } => f
                .debug_struct("PrivateKey")
                .field("bytes", &"[redacted]")
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// DerivedKey
// ---------------------------------------------------------------------------

/// An Ed25519 signing key ready for use. ed25519-dalek zeroizes it on drop.
pub struct DerivedKey {
    signing_key: SigningKey,
}

impl DerivedKey {
    fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The self-authenticating principal of this key.
    pub fn principal(&self) -> Principal {
        Principal::self_authenticating(&self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// The raw secret. Handle with care.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// IdentityKey
// ---------------------------------------------------------------------------

/// One account of the wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityKey {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub name: String,
    pub icon: String,
    pub key: KeyMaterial,
}

impl IdentityKey {
    /// A new account with a random v4 id and the default icon.
    pub fn new(name: impl Into<String>, key: KeyMaterial) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created: now,
            updated: now,
            name: name.into(),
            icon: DEFAULT_ACCOUNT_ICON.to_string(),
            key,
        }
    }

    /// Derives the account's principal.
    pub fn principal(&self) -> Result<Principal, KeyError> {
        Ok(self.key.derive()?.principal())
    }
}

// ---------------------------------------------------------------------------
// PrivateKeyBundle
// ---------------------------------------------------------------------------

/// Every account of the wallet, in display order, plus the selected one.
///
/// Invariants, upheld by every method here:
///
/// - `keys` is never empty;
/// - ids are pairwise unique;
/// - `current` is the id of a member of `keys`.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateKeyBundle {
    /// Phrase the first account was derived from; empty for a wallet
    /// created by private-key import.
    mnemonic: String,
    keys: Vec<IdentityKey>,
    current: Uuid,
}

impl PrivateKeyBundle {
    /// A bundle holding a single account, which becomes current.
    pub fn new(mnemonic: impl Into<String>, first: IdentityKey) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            current: first.id,
            keys: vec![first],
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn keys(&self) -> &[IdentityKey] {
        &self.keys
    }

    pub fn current(&self) -> Uuid {
        self.current
    }

    pub fn current_key(&self) -> Option<&IdentityKey> {
        self.find(self.current)
    }

    pub fn find(&self, id: Uuid) -> Option<&IdentityKey> {
        self.keys.iter().find(|k| k.id == id)
    }

    pub fn contains_material(&self, material: &KeyMaterial) -> bool {
        self.keys.iter().any(|k| k.key.same_material(material))
    }

    /// Default name for the next account: `"Account #<n>"`.
    pub fn next_account_name(&self) -> String {
        format!("Account #{}", self.keys.len() + 1)
    }

    /// Lowest subaccount index above every mnemonic-derived account.
    pub fn next_subaccount(&self) -> u32 {
        self.keys
            .iter()
            .filter_map(|k| match &k.key {
                KeyMaterial::Mnemonic { subaccount, .. } => Some(subaccount + 1),
                KeyMaterial::PrivateKey { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Appends `key`; the current selection is unchanged.
    pub fn push(&mut self, key: IdentityKey) -> Result<(), IdentityError> {
        if self.contains_material(&key.key) || self.find(key.id).is_some() {
            return Err(IdentityError::DuplicateKey);
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn select(&mut self, id: Uuid) -> Result<(), IdentityError> {
        if self.find(id).is_none() {
            return Err(IdentityError::NotFound(id));
        }
        self.current = id;
        Ok(())
    }

    /// Removes an account. Removing the current one selects the first
    /// remaining account; the last account cannot be removed.
    pub fn remove(&mut self, id: Uuid) -> Result<IdentityKey, IdentityError> {
        let position = self
            .keys
            .iter()
            .position(|k| k.id == id)
            .ok_or(IdentityError::NotFound(id))?;
        if self.keys.len() == 1 {
            return Err(IdentityError::LastKey);
        }
        let removed = self.keys.remove(position);
        if self.current == id {
            self.current = self.keys[0].id;
        }
        Ok(removed)
    }

    /// Renames an account and optionally changes its icon.
    pub fn rename(
        &mut self,
        id: Uuid,
        name: impl Into<String>,
        icon: Option<String>,
    ) -> Result<(), IdentityError> {
        let key = self
            .keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or(IdentityError::NotFound(id))?;
        key.name = name.into();
        if let Some(icon) = icon {
            key.icon = icon;
        }
        key.updated = Utc::now();
        Ok(())
    }
}

impl Drop for PrivateKeyBundle {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
    }
}

impl fmt::Debug for PrivateKeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyBundle")
            .field("mnemonic", &"[redacted]")
            .field("keys", &self.keys)
            .field("current", &self.current)
            .finish()
    }
}
