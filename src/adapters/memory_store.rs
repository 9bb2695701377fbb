//! Reference [`KvStore`] backed by an in-process `HashMap` (C3).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::TrieError;
use crate::ports::{KvStore, StoreOp};

/// An in-memory key-value store. Clones are cheap and alias the same
/// underlying map — use [`KvStore::copy`] for an independent snapshot.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| TrieError::Store("lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TrieError::Store("lock poisoned".into()))?;
        entries.insert(key, value);
        Ok(())
    }

    fn del(&self, key: &[u8]) -> Result<(), TrieError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TrieError::Store("lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }

    fn batch(&self, ops: Vec<StoreOp>) -> Result<(), TrieError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TrieError::Store("lock poisoned".into()))?;
        for op in ops {
            match op {
                StoreOp::Put(k, v) => {
                    entries.insert(k, v);
                }
                StoreOp::Delete(k) => {
                    entries.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn copy(&self) -> Box<dyn KvStore> {
        let entries = self.entries.read().expect("lock poisoned");
        Box::new(InMemoryStore {
            entries: Arc::new(RwLock::new(entries.clone())),
        })
    }
}
