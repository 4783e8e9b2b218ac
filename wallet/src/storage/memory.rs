//! In-memory [`KeyValueStore`]. Nothing survives the process, which is
//! exactly what tests and throwaway sessions want.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KeyValueStore, StorageResult, StoreOp};

/// A `BTreeMap` behind a `parking_lot::RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// A copy of every stored entry.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> StorageResult<()> {
        // One write guard for the whole batch: readers see all of it or none.
        let mut entries = self.entries.write();
        for op in ops {
            match op {
                StoreOp::Set(key, value) => {
                    entries.insert(key, value);
                }
                StoreOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
