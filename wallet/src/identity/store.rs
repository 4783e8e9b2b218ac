//! # Secure Identity Store
//!
//! Persists the password hash and the encrypted account bundle, and holds
//! the decrypted bundle in memory while the wallet is unlocked.
//!
//! ## Persisted layout
//!
//! ```text
//! password_hash     UTF-8 PHC string (Argon2id)
//! encrypted_bundle  salt(16) || nonce(12) || AES-256-GCM(bincode(bundle))
//! lifecycle_state   one byte: 0 initial, 1 locked, 2 alive
//! ```
//!
//! The bundle key is `Argon2id(password, salt)`. The salt is stored in the
//! clear next to the ciphertext; it is not a secret, it just has to be
//! unique.
//!
//! ## Write discipline
//!
//! - Creation writes all three keys in one atomic batch. There is never a
//!   hash without a bundle or a bundle without a hash.
//! - Every mutation clones the in-memory bundle, applies the change to the
//!   clone, re-seals and persists the whole thing, and only then swaps the
//!   clone in. A failed write leaves memory exactly as it was.
//! - Writers queue on a `tokio::sync::Mutex` (FIFO), so at most one persist
//!   is in flight at any time.
//!
//! ## Password lifetime
//!
//! The password is copied into a `Zeroizing<String>` at the API boundary
//! and moved into a single blocking task that hashes it and derives the
//! bundle key. When that task returns, the copy is wiped. Only the derived
//! key stays in memory, and only until [`SecureIdentityStore::lock`].

use std::sync::Arc;

use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::keys::{IdentityKey, KeyMaterial, PrivateKeyBundle};
use super::mnemonic;
use super::password::PasswordCodec;
use super::state::CurrentState;
use super::{CreateOutcome, IdentityError, ValidationError};
use crate::config::{AES_KEY_LENGTH, FIRST_ACCOUNT_NAME, KDF_SALT_LENGTH};
use crate::crypto::encryption::{open, seal};
use crate::storage::{KeyValueStore, StoreOp};

pub const PASSWORD_HASH_KEY: &str = "password_hash";
pub const ENCRYPTED_BUNDLE_KEY: &str = "encrypted_bundle";
pub const LIFECYCLE_STATE_KEY: &str = "lifecycle_state";

type BundleKey = Zeroizing<[u8; AES_KEY_LENGTH]>;

/// The decrypted session: bundle key, its salt, and the bundle itself.
struct UnlockedVault {
    key: BundleKey,
    salt: [u8; KDF_SALT_LENGTH],
    bundle: PrivateKeyBundle,
}

fn seal_bundle(
    key: &BundleKey,
    salt: &[u8; KDF_SALT_LENGTH],
    bundle: &PrivateKeyBundle,
) -> Result<Vec<u8>, IdentityError> {
    let plaintext = Zeroizing::new(bincode::serialize(bundle)?);
    let sealed = seal(key, &plaintext)?;
    let mut out = Vec::with_capacity(KDF_SALT_LENGTH + sealed.len());
    out.extend_from_slice(salt);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn open_bundle(key: &BundleKey, ciphertext: &[u8]) -> Result<PrivateKeyBundle, IdentityError> {
    let plaintext = Zeroizing::new(open(key, ciphertext)?);
    Ok(bincode::deserialize(&plaintext)?)
}

fn split_salt(blob: &[u8]) -> Result<([u8; KDF_SALT_LENGTH], &[u8]), IdentityError> {
    if blob.len() < KDF_SALT_LENGTH {
        return Err(IdentityError::Corrupt("bundle shorter than its salt".into()));
    }
    let (salt, rest) = blob.split_at(KDF_SALT_LENGTH);
    let mut out = [0u8; KDF_SALT_LENGTH];
    out.copy_from_slice(salt);
    Ok((out, rest))
}

/// Persists and guards the wallet's key bundle.
pub struct SecureIdentityStore {
    backend: Arc<dyn KeyValueStore>,
    codec: PasswordCodec,
    write_lock: tokio::sync::Mutex<()>,
    session: RwLock<Option<UnlockedVault>>,
}

impl SecureIdentityStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, codec: PasswordCodec) -> Self {
        Self {
            backend,
            codec,
            write_lock: tokio::sync::Mutex::new(()),
            session: RwLock::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `true` if a password hash is persisted.
    pub async fn has_identity(&self) -> Result<bool, IdentityError> {
        Ok(self.backend.get(PASSWORD_HASH_KEY).await?.is_some())
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.read().is_some()
    }

    /// A copy of the decrypted bundle, if unlocked.
    pub fn bundle(&self) -> Option<PrivateKeyBundle> {
        self.session.read().as_ref().map(|v| v.bundle.clone())
    }

    /// `true` if an account with identical derivation material is already
    /// stored. With no identity at all the answer is trivially `false`.
    pub async fn exists(&self, material: &KeyMaterial) -> Result<bool, IdentityError> {
        let known = self
            .session
            .read()
            .as_ref()
            .map(|vault| vault.bundle.contains_material(material));
        if let Some(found) = known {
            return Ok(found);
        }
        if self.has_identity().await? {
            Err(IdentityError::Locked)
        } else {
            Ok(false)
        }
    }

    /// The lifecycle byte last written, if any.
    pub async fn load_lifecycle(&self) -> Result<Option<CurrentState>, IdentityError> {
        match self.backend.get(LIFECYCLE_STATE_KEY).await? {
            None => Ok(None),
            Some(raw) => match raw.as_slice() {
                [byte] => CurrentState::from_byte(*byte)
                    .map(Some)
                    .ok_or_else(|| IdentityError::Corrupt(format!("lifecycle byte {}", byte))),
                _ => Err(IdentityError::Corrupt("lifecycle value is not one byte".into())),
            },
        }
    }

    pub async fn persist_lifecycle(&self, state: CurrentState) -> Result<(), IdentityError> {
        let _guard = self.write_lock.lock().await;
        self.backend
            .set(LIFECYCLE_STATE_KEY, vec![state.to_byte()])
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates the wallet from a recovery phrase. The first account is
    /// `"Account #1"` at subaccount 0.
    pub async fn create_from_mnemonic(
        &self,
        password: &str,
        phrase: &str,
    ) -> Result<CreateOutcome, IdentityError> {
        if !PasswordCodec::check_strength(password) {
            return Ok(CreateOutcome::Rejected(ValidationError::WeakPassword));
        }
        if !mnemonic::validate(phrase) {
            return Ok(CreateOutcome::Rejected(ValidationError::InvalidMnemonic));
        }
        let normalized = mnemonic::normalize(phrase);
        let first = IdentityKey::new(FIRST_ACCOUNT_NAME, KeyMaterial::mnemonic(&normalized, 0));
        let bundle = PrivateKeyBundle::new(normalized, first);
        self.create(password, bundle).await
    }

    /// Creates the wallet from a hex-encoded 32-byte private key. The
    /// bundle's phrase is left empty.
    pub async fn create_from_private_key(
        &self,
        password: &str,
        private_key_hex: &str,
    ) -> Result<CreateOutcome, IdentityError> {
        if !PasswordCodec::check_strength(password) {
            return Ok(CreateOutcome::Rejected(ValidationError::WeakPassword));
        }
        let material = match KeyMaterial::private_key_hex(private_key_hex) {
            Ok(material) => material,
            Err(_) => return Ok(CreateOutcome::Rejected(ValidationError::InvalidPrivateKey)),
        };
        let bundle = PrivateKeyBundle::new(String::new(), IdentityKey::new(FIRST_ACCOUNT_NAME, material));
        self.create(password, bundle).await
    }

    async fn create(
        &self,
        password: &str,
        bundle: PrivateKeyBundle,
    ) -> Result<CreateOutcome, IdentityError> {
        let _guard = self.write_lock.lock().await;
        if self.backend.get(PASSWORD_HASH_KEY).await?.is_some() {
            return Err(IdentityError::AlreadyInitialized);
        }

        // Catch bad material before anything is persisted.
        let principal = bundle
            .current_key()
            .ok_or_else(|| IdentityError::Corrupt("new bundle has no current key".into()))?
            .principal()?;

        let mut salt = [0u8; KDF_SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);

        let codec = self.codec;
        let password = Zeroizing::new(password.to_owned());
        let (hash, key) = tokio::task::spawn_blocking(move || {
            let hash = codec.hash(&password)?;
            let key = codec.derive_key(&password, &salt)?;
            Ok::<_, IdentityError>((hash, key))
        })
        .await
        .map_err(|e| IdentityError::Task(e.to_string()))??;

        let sealed = seal_bundle(&key, &salt, &bundle)?;
        self.backend
            .apply(vec![
                StoreOp::Set(PASSWORD_HASH_KEY.into(), hash.into_bytes()),
                StoreOp::Set(ENCRYPTED_BUNDLE_KEY.into(), sealed),
                StoreOp::Set(
                    LIFECYCLE_STATE_KEY.into(),
                    vec![CurrentState::Alive.to_byte()],
                ),
            ])
            .await?;

        *self.session.write() = Some(UnlockedVault {
            key,
            salt,
            bundle: bundle.clone(),
        });
        info!(principal = %principal, "identity created");
        Ok(CreateOutcome::Created(bundle))
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Verifies `password` and, on success, decrypts the bundle into
    /// memory. A wrong password changes nothing and returns `false`.
    pub async fn unlock(&self, password: &str) -> Result<bool, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let hash = self
            .backend
            .get(PASSWORD_HASH_KEY)
            .await?
            .ok_or(IdentityError::NotInitialized)?;
        let hash = String::from_utf8(hash)
            .map_err(|_| IdentityError::Corrupt("password hash is not UTF-8".into()))?;
        let blob = self
            .backend
            .get(ENCRYPTED_BUNDLE_KEY)
            .await?
            .ok_or_else(|| IdentityError::Corrupt("password hash without bundle".into()))?;
        let (salt, ciphertext) = split_salt(&blob)?;

        let codec = self.codec;
        let password = Zeroizing::new(password.to_owned());
        let key = tokio::task::spawn_blocking(move || {
            if !codec.verify(&password, &hash) {
                return Ok(None);
            }
            codec.derive_key(&password, &salt).map(Some)
        })
        .await
        .map_err(|e| IdentityError::Task(e.to_string()))??;

        let Some(key) = key else {
            warn!("unlock rejected: wrong password");
            return Ok(false);
        };

        let bundle = open_bundle(&key, ciphertext)?;
        debug!(accounts = bundle.keys().len(), "bundle decrypted");
        *self.session.write() = Some(UnlockedVault { key, salt, bundle });
        Ok(true)
    }

    /// Drops the in-memory key and bundle. Waits for any in-flight write.
    pub async fn lock(&self) {
        let _guard = self.write_lock.lock().await;
        self.session.write().take();
    }

    /// Deletes every persisted identity key and forgets the session.
    pub async fn wipe(&self) -> Result<(), IdentityError> {
        let _guard = self.write_lock.lock().await;
        self.backend
            .apply(vec![
                StoreOp::Delete(PASSWORD_HASH_KEY.into()),
                StoreOp::Delete(ENCRYPTED_BUNDLE_KEY.into()),
                StoreOp::Delete(LIFECYCLE_STATE_KEY.into()),
            ])
            .await?;
        self.session.write().take();
        info!("identity wiped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Applies `change` to a copy of the bundle, persists the copy, then
    /// makes it the session bundle.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut PrivateKeyBundle) -> Result<T, IdentityError>,
    ) -> Result<(T, PrivateKeyBundle), IdentityError> {
        let _guard = self.write_lock.lock().await;
        let (key, salt, mut bundle) = {
            let session = self.session.read();
            let vault = session.as_ref().ok_or(IdentityError::Locked)?;
            (vault.key.clone(), vault.salt, vault.bundle.clone())
        };

        let out = change(&mut bundle)?;
        let sealed = seal_bundle(&key, &salt, &bundle)?;
        self.backend.set(ENCRYPTED_BUNDLE_KEY, sealed).await?;

        if let Some(vault) = self.session.write().as_mut() {
            vault.bundle = bundle.clone();
        }
        Ok((out, bundle))
    }

    /// Appends an account for `material`. The default name is
    /// `"Account #<n>"`.
    pub async fn push_key(
        &self,
        material: KeyMaterial,
        name: Option<String>,
    ) -> Result<PrivateKeyBundle, IdentityError> {
        let principal = material.derive()?.principal();
        let (id, bundle) = self
            .mutate(move |bundle| {
                let name = name.unwrap_or_else(|| bundle.next_account_name());
                let key = IdentityKey::new(name, material);
                let id = key.id;
                bundle.push(key)?;
                Ok(id)
            })
            .await?;
        info!(%id, principal = %principal, "account added");
        Ok(bundle)
    }

    /// Derives the next account from the wallet's own recovery phrase.
    pub async fn push_derived(&self, name: Option<String>) -> Result<PrivateKeyBundle, IdentityError> {
        let material = {
            let session = self.session.read();
            let vault = session.as_ref().ok_or(IdentityError::Locked)?;
            if vault.bundle.mnemonic().is_empty() {
                return Err(IdentityError::NoMnemonic);
            }
            KeyMaterial::mnemonic(vault.bundle.mnemonic(), vault.bundle.next_subaccount())
        };
        self.push_key(material, name).await
    }

    pub async fn select_current(&self, id: Uuid) -> Result<PrivateKeyBundle, IdentityError> {
        let ((), bundle) = self.mutate(|bundle| bundle.select(id)).await?;
        debug!(%id, "current account selected");
        Ok(bundle)
    }

    pub async fn remove_key(&self, id: Uuid) -> Result<PrivateKeyBundle, IdentityError> {
        let (_removed, bundle) = self.mutate(|bundle| bundle.remove(id)).await?;
        info!(%id, current = %bundle.current(), "account removed");
        Ok(bundle)
    }

    pub async fn rename_key(
        &self,
        id: Uuid,
        name: String,
        icon: Option<String>,
    ) -> Result<PrivateKeyBundle, IdentityError> {
        let ((), bundle) = self
            .mutate(|bundle| bundle.rename(id, name, icon))
            .await?;
        Ok(bundle)
    }
}
