//! # Storage Module
//!
//! An opaque key-value persistence interface for the identity store. The
//! backend sees byte blobs and string keys, nothing else: encryption at rest
//! is the identity store's job, so a backend never has to be trusted with
//! plaintext.
//!
//! ```text
//! memory.rs: in-process BTreeMap behind a lock (tests, ephemeral sessions)
//! sled.rs  : sled embedded database (the CLI's on-disk store)
//! ```
//!
//! ## Atomicity
//!
//! [`KeyValueStore::apply`] takes a batch of operations that must land
//! together or not at all. The identity store relies on this to write the
//! password hash and the sealed bundle as one unit: a hash without a bundle
//! (or the reverse) would brick the wallet.

pub mod memory;
pub mod sled;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::sled::SledStore;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] ::sled::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Insert or overwrite `key` with the given bytes.
    Set(String, Vec<u8>),
    /// Remove `key`. Removing an absent key is not an error.
    Delete(String),
}

/// Asynchronous key-value persistence over opaque byte blobs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Apply every operation in `ops` atomically.
    async fn apply(&self, ops: Vec<StoreOp>) -> StorageResult<()>;
}
