//! # Sled-backed Store
//!
//! On-disk [`KeyValueStore`] built on sled's embedded B+ tree. All wallet
//! keys live in one named tree so that the database can be shared with
//! other data later without key collisions.
//!
//! ## Atomicity
//!
//! Batches go through `Tree::apply_batch`, which sled guarantees to be
//! atomic. Every write is followed by an async flush, so a returned `Ok`
//! means the bytes are durable.

use std::path::Path;

use async_trait::async_trait;
use sled::{Batch, Db, Tree};

use super::{KeyValueStore, StorageResult, StoreOp};

/// Name of the sled tree holding wallet state.
const WALLET_TREE: &str = "wallet";

/// Persistent key-value store over sled.
///
/// sled handles are cheap to clone and thread-safe; `SledStore` can be
/// shared via `Arc` without extra synchronization.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that lives in a temporary location and is removed on drop.
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let tree = db.open_tree(WALLET_TREE)?;
        Ok(Self { db, tree })
    }

    async fn flush(&self) -> StorageResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.tree.insert(key.as_bytes(), value)?;
        self.flush().await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.tree.remove(key.as_bytes())?;
        self.flush().await
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> StorageResult<()> {
        let mut batch = Batch::default();
        for op in ops {
            match op {
                StoreOp::Set(key, value) => batch.insert(key.as_bytes(), value),
                StoreOp::Delete(key) => batch.remove(key.as_bytes()),
            }
        }
        self.tree.apply_batch(batch)?;
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temporary_store_roundtrip() {
        let store = SledStore::open_temporary().unwrap();
        store.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store
                .apply(vec![
                    StoreOp::Set("password_hash".into(), b"h".to_vec()),
                    StoreOp::Set("encrypted_bundle".into(), b"b".to_vec()),
                ])
                .await
                .unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get("password_hash").await.unwrap(), Some(b"h".to_vec()));
        assert_eq!(store.get("encrypted_bundle").await.unwrap(), Some(b"b".to_vec()));
    }
}
