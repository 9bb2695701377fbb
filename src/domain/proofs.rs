//! Merkle point-proof and range-proof creation/verification (C6).
//!
//! Both verifiers work by reconstructing an ephemeral trie from the
//! supplied node bytes and re-deriving the root the normal way, rather
//! than implementing a separate bottom-up hash-matching walk. This keeps
//! the verification logic honest by construction: it is the same code
//! path that produces roots when building a trie in the first place.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::domain::config::TrieConfig;
use crate::domain::nibbles::Nibbles;
use crate::domain::primitives::Hash;
use crate::domain::trie::Trie;
use crate::domain::TrieError;
use crate::ports::{KvStore, StoreOp};

/// A minimal, read-only store seeded entirely from proof bytes. Kept local
/// to this module rather than reused from `adapters` so the domain layer
/// never depends downward on an adapter.
struct ProofStore(HashMap<Vec<u8>, Vec<u8>>);

impl ProofStore {
    fn new() -> Self {
        Self(HashMap::new())
    }

    fn seed(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.0.insert(key, value);
    }
}

impl KvStore for ProofStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.0.get(key).cloned())
    }

    fn put(&self, _key: Vec<u8>, _value: Vec<u8>) -> Result<(), TrieError> {
        Err(TrieError::Store("proof store is read-only".into()))
    }

    fn del(&self, _key: &[u8]) -> Result<(), TrieError> {
        Err(TrieError::Store("proof store is read-only".into()))
    }

    fn copy(&self) -> Box<dyn KvStore> {
        Box::new(ProofStore(self.0.clone()))
    }
}

/// An overlay store that seeds from proof bytes but still allows writes,
/// used only by range-proof verification to replay the claimed entries on
/// top of the proof-anchored edges.
struct OverlayStore(std::sync::RwLock<HashMap<Vec<u8>, Vec<u8>>>);

impl OverlayStore {
    fn new() -> Self {
        Self(std::sync::RwLock::new(HashMap::new()))
    }
}

impl KvStore for OverlayStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.0.read().expect("lock poisoned").get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.0.write().expect("lock poisoned").insert(key, value);
        Ok(())
    }

    fn del(&self, key: &[u8]) -> Result<(), TrieError> {
        self.0.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    fn batch(&self, ops: Vec<StoreOp>) -> Result<(), TrieError> {
        let mut map = self.0.write().expect("lock poisoned");
        for op in ops {
            match op {
                StoreOp::Put(k, v) => {
                    map.insert(k, v);
                }
                StoreOp::Delete(k) => {
                    map.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn copy(&self) -> Box<dyn KvStore> {
        Box::new(OverlayStore(std::sync::RwLock::new(
            self.0.read().expect("lock poisoned").clone(),
        )))
    }
}

/// Build a point proof: the RLP bytes of every node on the path from the
/// root to `key`, in root-first order.
pub fn create_proof<S: KvStore>(trie: &Trie<S>, key: &[u8]) -> Result<Vec<Vec<u8>>, TrieError> {
    let result = trie.find_path(key)?;
    Ok(result.nodes.iter().map(|n| n.serialize()).collect())
}

/// Verify that `proof` authenticates `key`'s value (or its absence) under
/// `root`. Returns the value the proof attests to, which is `None` for a
/// valid exclusion proof.
pub fn verify_proof(
    root: Hash,
    key: &[u8],
    proof: &[Vec<u8>],
    config: TrieConfig,
) -> Result<Option<Vec<u8>>, TrieError> {
    let mut store = ProofStore::new();
    for node_bytes in proof {
        let h = config.hasher.hash(node_bytes);
        store.seed(h.to_vec(), node_bytes.clone());
    }

    let trie = Trie::with_root(store, root, config);
    match trie.get(key) {
        Ok(value) => Ok(value),
        Err(TrieError::MissingNode(h)) => {
            tracing::warn!(node = %h, "point proof did not cover a node on the path");
            Err(TrieError::InvalidProof(format!("proof missing node {h}")))
        }
        Err(e) => Err(e),
    }
}

/// Build a range proof covering every entry with a routed key in
/// `[first_key, last_key]`: the node bodies visited on the path to both
/// boundary keys (enough to authenticate everything outside the range is
/// excluded) and to every entry inside it, plus the entries themselves.
///
/// Every entry's own path is included, not just the two edges: a shared
/// ancestor that neither edge path happens to pass through (an interior
/// branch reached only by a middle key) must still be in the proof, since
/// `verify_range_proof` replays every entry through the ordinary insertion
/// path and needs every node that walk touches.
pub fn create_range_proof<S: KvStore>(
    trie: &Trie<S>,
    first_key: &[u8],
    last_key: &[u8],
) -> Result<(Vec<(Vec<u8>, Vec<u8>)>, Vec<Vec<u8>>), TrieError> {
    let entries = trie.entries_in_range(first_key, last_key)?;

    let mut seen = HashSet::new();
    let mut proof = Vec::new();
    let mut collect_path = |path: &[u8]| -> Result<(), TrieError> {
        for node in trie.find_path(path)?.nodes {
            let bytes = node.serialize();
            if seen.insert(bytes.clone()) {
                proof.push(bytes);
            }
        }
        Ok(())
    };

    collect_path(first_key)?;
    collect_path(last_key)?;
    for (key, _) in &entries {
        collect_path(key)?;
    }

    Ok((entries, proof))
}

/// Verify a range proof: `keys`/`values` must be the complete, strictly
/// ascending set of entries between `first_key` and `last_key`. Replays
/// them onto a trie seeded only with the edge proof and checks the
/// resulting root matches — if an entry was omitted or invented, the
/// replay lands on a different root.
pub fn verify_range_proof(
    root: Hash,
    first_key: &[u8],
    last_key: &[u8],
    keys: &[Vec<u8>],
    values: &[Vec<u8>],
    proof: &[Vec<u8>],
    config: TrieConfig,
) -> Result<(), TrieError> {
    if keys.len() != values.len() {
        return Err(TrieError::InvalidProof("keys/values length mismatch".into()));
    }
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TrieError::InvalidProof(
            "range entries must be strictly increasing".into(),
        ));
    }
    if let (Some(first), Some(last)) = (keys.first(), keys.last()) {
        if first.as_slice() < first_key || last.as_slice() > last_key {
            return Err(TrieError::InvalidProof(
                "entries fall outside the claimed bounds".into(),
            ));
        }
    }

    let overlay = OverlayStore::new();
    for node_bytes in proof {
        let h = config.hasher.hash(node_bytes);
        overlay
            .put(h.to_vec(), node_bytes.clone())
            .expect("overlay store accepts writes");
    }

    let trie = Trie::with_root(overlay, root, config);
    for (key, value) in keys.iter().zip(values.iter()) {
        let path = Nibbles::from_bytes(key);
        trie.put_at_path_locked(path, value.clone()).map_err(|e| match e {
            TrieError::MissingNode(h) => {
                tracing::warn!(node = %h, "range proof replay hit a node missing from the proof");
                TrieError::InvalidProof(format!("proof missing node {h}"))
            }
            other => other,
        })?;
    }

    if trie.root() == root {
        Ok(())
    } else {
        tracing::warn!("range proof replay produced a different root than claimed");
        Err(TrieError::InvalidProof(
            "reconstructed root does not match claimed root".into(),
        ))
    }
}
