//! # Identity & Key Lifecycle
//!
//! Everything between "the user typed twelve words and a password" and
//! "here is a signing key for the selected account":
//!
//! - **password**: Argon2id hashing, verification, strength policy and the
//!   bundle encryption key.
//! - **mnemonic**: BIP39 validation, generation and seeds.
//! - **keys**: SLIP-0010 derivation, key material and the account bundle.
//! - **principal**: principals and legacy account identifiers.
//! - **store**: the encrypted, persisted bundle and the unlocked session.
//! - **state**: the INITIAL / LOCKED / ALIVE state machine in front of it.
//!
//! Callers are expected to go through [`WalletStateMachine`]; the store on
//! its own does not know which operations are legal when.

pub mod keys;
pub mod mnemonic;
pub mod password;
pub mod principal;
pub mod state;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use keys::{DerivedKey, IdentityKey, KeyError, KeyMaterial, PrivateKeyBundle};
pub use password::{PasswordCodec, PasswordError};
pub use principal::{AccountIdentifier, Principal, PrincipalError};
pub use state::{CurrentState, WalletStateMachine};
pub use store::SecureIdentityStore;

use crate::crypto::EncryptionError;
use crate::storage::StorageError;

/// Expected user-input failures. These come back inside
/// [`CreateOutcome::Rejected`], never as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("password does not meet the strength policy")]
    WeakPassword,

    #[error("recovery phrase is not a valid 12 or 24 word mnemonic")]
    InvalidMnemonic,

    #[error("private key must be 32 bytes of hex")]
    InvalidPrivateKey,
}

/// Result of an identity-creating call that got past the state check.
#[derive(Debug)]
pub enum CreateOutcome {
    /// The identity was persisted; here is the new bundle.
    Created(PrivateKeyBundle),
    /// Input was rejected before anything was hashed or written.
    Rejected(ValidationError),
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Errors from the identity store and state machine.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The operation is not legal in the current lifecycle state. Nothing
    /// was changed.
    #[error("{operation} is not allowed while the wallet is {state}")]
    State {
        operation: &'static str,
        state: CurrentState,
    },

    /// An account with the same key material already exists.
    #[error("an account with this key already exists")]
    DuplicateKey,

    #[error("no account with id {0}")]
    NotFound(Uuid),

    /// The bundle must keep at least one account.
    #[error("cannot remove the last account")]
    LastKey,

    /// The bundle is not decrypted in this session.
    #[error("wallet is locked")]
    Locked,

    /// An identity is already persisted.
    #[error("an identity already exists")]
    AlreadyInitialized,

    /// No identity is persisted.
    #[error("no identity exists")]
    NotInitialized,

    /// The wallet was created from a private key, so there is no phrase to
    /// derive further accounts from.
    #[error("wallet has no recovery phrase to derive accounts from")]
    NoMnemonic,

    /// Key material could not be turned into a key.
    #[error("key derivation failed: {0}")]
    Derivation(#[from] KeyError),

    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted state exists but is malformed.
    #[error("persisted identity state is corrupt: {0}")]
    Corrupt(String),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<bincode::Error> for IdentityError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
