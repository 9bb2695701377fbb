//! Construction-time options for a [`crate::domain::Trie`] (§6).

use std::sync::Arc;

use crate::domain::hash::{Hasher, Keccak256Hasher};

/// Options controlling a trie's hashing and persistence behavior.
///
/// Cloning a `TrieConfig` is cheap: the hasher is held behind an `Arc`.
#[derive(Clone)]
pub struct TrieConfig {
    /// Hash function used to address nodes. Defaults to Keccak-256.
    pub hasher: Arc<dyn Hasher>,
    /// "Secure trie" mode: hash every key with `hasher` before routing it,
    /// so trie shape never leaks the relative ordering of unhashed keys.
    pub hash_keys: bool,
    /// If true, a `del` that removes the last surviving value also deletes
    /// the now-orphaned node bodies it collapsed through. If false, stale
    /// node bodies are left in the store (cheaper, but the store only grows).
    pub delete_on_write: bool,
    /// If true, the current root is written to the store under
    /// [`crate::domain::primitives::ROOT_DB_KEY`] after every mutation, so a
    /// `Trie` can be reopened against the same store without the caller
    /// having to track the root itself.
    pub persist_root: bool,
}

impl TrieConfig {
    pub fn with_hasher(hasher: Arc<dyn Hasher>) -> Self {
        Self {
            hasher,
            ..Self::default()
        }
    }
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            hasher: Arc::new(Keccak256Hasher),
            hash_keys: false,
            delete_on_write: true,
            persist_root: false,
        }
    }
}
