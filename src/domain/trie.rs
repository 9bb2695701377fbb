//! # Core trie engine (C5)
//!
//! `Trie<S>` owns a root hash and a handle to a [`KvStore`]. Mutating calls
//! (`put`/`del`/`batch`) serialize through `mutate_gate`; reads (`get`,
//! `find_path`, iteration, proof creation) only ever take the brief `root`
//! read lock, so they never block behind a long-running mutation except at
//! the instant the root itself swaps.
//!
//! `put`/`del` are written as ordinary recursion rather than an explicit
//! `Vec`-based stack: the walk down to the mutation point is the call
//! stack, and `save_stack` is what runs on the way back up each level,
//! re-encoding and persisting the node that level just produced before
//! handing its reference to the caller above it.

use std::sync::{Mutex, RwLock};

use crate::domain::hash::{self, Hasher};
use crate::domain::config::TrieConfig;
use crate::domain::nibbles::Nibbles;
use crate::domain::node::{is_raw_ref, NodeRef, TrieNode};
use crate::domain::primitives::{Hash, HASH_LEN, ROOT_DB_KEY};
use crate::domain::TrieError;
use crate::ports::{KvStore, StoreOp};

/// What a [`Trie::find_path`] walk turned up.
pub struct PathResult {
    /// Every node visited, root first, in the order the walk descended
    /// through them. This is exactly the node list a Merkle point-proof
    /// needs (§4.6): each entry's serialization is one proof element.
    pub nodes: Vec<TrieNode>,
    /// The value stored at the key, if the walk reached a terminating
    /// Leaf or Branch value slot that matched it exactly.
    pub value: Option<Vec<u8>>,
}

/// A batched mutation, applied atomically by [`Trie::batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A persistent, content-addressed key-value trie over a pluggable
/// [`KvStore`].
pub struct Trie<S: KvStore> {
    store: S,
    root: RwLock<Hash>,
    mutate_gate: Mutex<()>,
    config: TrieConfig,
}

impl<S: KvStore> Trie<S> {
    /// A fresh, empty trie over `store`, using the default [`TrieConfig`].
    pub fn new(store: S) -> Self {
        Self::with_config(store, TrieConfig::default())
    }

    /// A fresh, empty trie over `store` with explicit configuration.
    pub fn with_config(store: S, config: TrieConfig) -> Self {
        let root = hash::empty_root(config.hasher.as_ref());
        Self {
            store,
            root: RwLock::new(root),
            mutate_gate: Mutex::new(()),
            config,
        }
    }

    /// Attach to an already-populated `store` at a known `root`.
    pub fn with_root(store: S, root: Hash, config: TrieConfig) -> Self {
        Self {
            store,
            root: RwLock::new(root),
            mutate_gate: Mutex::new(()),
            config,
        }
    }

    /// Reopen a trie whose root was persisted via [`TrieConfig::persist_root`],
    /// falling back to the empty root if the store has none recorded.
    pub fn open(store: S, config: TrieConfig) -> Result<Self, TrieError> {
        let root = match store.get(ROOT_DB_KEY)? {
            Some(bytes) => {
                if bytes.len() != HASH_LEN {
                    return Err(TrieError::InvalidRoot {
                        expected: HASH_LEN,
                        actual: bytes.len(),
                    });
                }
                let mut h = [0u8; HASH_LEN];
                h.copy_from_slice(&bytes);
                h
            }
            None => hash::empty_root(config.hasher.as_ref()),
        };
        Ok(Self {
            store,
            root: RwLock::new(root),
            mutate_gate: Mutex::new(()),
            config,
        })
    }

    pub fn root(&self) -> Hash {
        *self.root.read().expect("root lock poisoned")
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// An independent snapshot of this trie: a separate store (per
    /// [`KvStore::copy`]) at the same root, sharing nothing further with
    /// the original. Mutating the copy never affects `self`.
    pub fn copy(&self) -> Trie<Box<dyn KvStore>> {
        Trie {
            store: self.store.copy(),
            root: RwLock::new(self.root()),
            mutate_gate: Mutex::new(()),
            config: self.config.clone(),
        }
    }

    /// Routes `key` into a nibble path, hashing it first if
    /// [`TrieConfig::hash_keys`] is set ("secure trie" mode).
    fn route(&self, key: &[u8]) -> Nibbles {
        if self.config.hash_keys {
            Nibbles::from_bytes(&self.config.hasher.hash(key))
        } else {
            Nibbles::from_bytes(key)
        }
    }

    fn check_not_reserved(&self, key: &[u8]) -> Result<(), TrieError> {
        if key == ROOT_DB_KEY {
            Err(TrieError::ReservedKey)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, node_ref: &NodeRef) -> Result<TrieNode, TrieError> {
        match node_ref {
            NodeRef::Inline(n) => Ok((**n).clone()),
            NodeRef::Hash(h) => {
                let bytes = self
                    .store
                    .get(h)?
                    .ok_or_else(|| TrieError::missing_node(h))?;
                TrieNode::decode(&bytes)
            }
        }
    }

    fn root_node(&self, root: &Hash) -> Result<Option<TrieNode>, TrieError> {
        if *root == hash::empty_root(self.config.hasher.as_ref()) {
            return Ok(None);
        }
        let bytes = self
            .store
            .get(root)?
            .ok_or_else(|| TrieError::missing_node(root))?;
        Ok(Some(TrieNode::decode(&bytes)?))
    }

    // ---- reads -------------------------------------------------------

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.find_path(key)?.value)
    }

    /// Walk from the root toward `key`, stopping either at an exact match
    /// or as soon as the stored structure diverges from it. The returned
    /// node list is root-first and is exactly what a point proof needs.
    pub fn find_path(&self, key: &[u8]) -> Result<PathResult, TrieError> {
        let root = self.root();
        let mut remaining = self.route(key);
        let mut nodes = Vec::new();

        let mut current = match self.root_node(&root)? {
            Some(n) => n,
            None => return Ok(PathResult { nodes, value: None }),
        };

        loop {
            match current {
                TrieNode::Leaf { path, value } => {
                    let found = path == remaining;
                    nodes.push(TrieNode::Leaf { path, value: value.clone() });
                    return Ok(PathResult {
                        nodes,
                        value: if found { Some(value) } else { None },
                    });
                }
                TrieNode::Extension { path, child } => {
                    let matches = remaining.starts_with(&path);
                    nodes.push(TrieNode::Extension { path: path.clone(), child: child.clone() });
                    if !matches {
                        return Ok(PathResult { nodes, value: None });
                    }
                    remaining = remaining.slice(path.len());
                    current = self.resolve(&child)?;
                }
                TrieNode::Branch { children, value } => {
                    nodes.push(TrieNode::Branch {
                        children: children.clone(),
                        value: value.clone(),
                    });
                    if remaining.is_empty() {
                        return Ok(PathResult { nodes, value });
                    }
                    let nibble = remaining.at(0) as usize;
                    match &children[nibble] {
                        Some(child_ref) => {
                            remaining = remaining.slice(1);
                            current = self.resolve(child_ref)?;
                        }
                        None => return Ok(PathResult { nodes, value: None }),
                    }
                }
            }
        }
    }

    fn get_at(&self, node: &TrieNode, path: &Nibbles) -> Result<Option<Vec<u8>>, TrieError> {
        match node {
            TrieNode::Leaf { path: leaf_path, value } => {
                Ok(if leaf_path == path { Some(value.clone()) } else { None })
            }
            TrieNode::Extension { path: ext_path, child } => {
                if path.starts_with(ext_path) {
                    let rest = path.slice(ext_path.len());
                    let child_node = self.resolve(child)?;
                    self.get_at(&child_node, &rest)
                } else {
                    Ok(None)
                }
            }
            TrieNode::Branch { children, value } => {
                if path.is_empty() {
                    Ok(value.clone())
                } else {
                    let nibble = path.at(0) as usize;
                    match &children[nibble] {
                        Some(child_ref) => {
                            let child_node = self.resolve(child_ref)?;
                            self.get_at(&child_node, &path.slice(1))
                        }
                        None => Ok(None),
                    }
                }
            }
        }
    }

    /// Every key/value pair whose routed key falls within `[first_key,
    /// last_key]` (both given as un-routed caller keys). In `hash_keys`
    /// mode the returned keys are the hashed (routed) bytes, not the
    /// original preimages — the trie never stores the preimage.
    pub fn entries_in_range(
        &self,
        first_key: &[u8],
        last_key: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, TrieError> {
        let first = self.route(first_key).to_bytes();
        let last = self.route(last_key).to_bytes();

        let root = self.root();
        let root_node = match self.root_node(&root)? {
            None => return Ok(Vec::new()),
            Some(n) => n,
        };

        let mut controller = super::walker::WalkController::new(&self.store);
        controller.seed(root_node);

        let mut found = Vec::new();
        controller.run(|path, value| {
            if path.len() % 2 == 0 {
                found.push((path.to_bytes(), value));
            }
        })?;

        found.retain(|(k, _)| k.as_slice() >= first.as_slice() && k.as_slice() <= last.as_slice());
        found.sort();
        Ok(found)
    }

    /// A lazily-resolving in-order iterator over every entry in the trie.
    pub fn iter(&self) -> Result<super::iter::TrieIterator<'_>, TrieError> {
        let root = self.root();
        let root_node = self.root_node(&root)?;
        Ok(super::iter::TrieIterator::new(&self.store, root_node))
    }

    // ---- writes --------------------------------------------------------

    /// A `put` of an empty value is an alias for `del` (§4.5 of the design
    /// doc), matching the source's own leniency here rather than rejecting
    /// it — only a `put` nested inside `batch()` treats an empty value as
    /// an error, since there it more likely signals a caller mistake.
    pub fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        let _guard = self.mutate_gate.lock().expect("mutate gate poisoned");
        tracing::debug!(key_len = key.len(), "acquired mutation gate for put");
        if value.is_empty() {
            self.del_locked(key)
        } else {
            self.put_locked(key, value)
        }
    }

    pub fn del(&self, key: &[u8]) -> Result<(), TrieError> {
        let _guard = self.mutate_gate.lock().expect("mutate gate poisoned");
        tracing::debug!(key_len = key.len(), "acquired mutation gate for del");
        self.del_locked(key)
    }

    /// Apply every operation under a single mutation-gate acquisition.
    /// Each individual put/del still flushes its own node writes as one
    /// atomic `store.batch()` call; the list as a whole is not rolled back
    /// on a later error, so a failure here should be treated as leaving
    /// `root` at whatever state the successful prefix produced.
    pub fn batch(&self, ops: Vec<BatchOp>) -> Result<(), TrieError> {
        let _guard = self.mutate_gate.lock().expect("mutate gate poisoned");
        tracing::debug!(count = ops.len(), "flushing batch under mutation gate");
        for op in ops {
            match op {
                BatchOp::Put(key, value) => {
                    if value.is_empty() {
                        return Err(TrieError::InvalidBatchOp);
                    }
                    self.put_locked(&key, value)?;
                }
                BatchOp::Delete(key) => self.del_locked(&key)?,
            }
        }
        Ok(())
    }

    fn put_locked(&self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        self.check_not_reserved(key)?;
        let path = self.route(key);
        self.put_at_path(path, value)
    }

    fn put_at_path(&self, path: Nibbles, value: Vec<u8>) -> Result<(), TrieError> {
        let root = self.root();
        let mut ops = Vec::new();
        let new_root_ref = match self.root_node(&root)? {
            None => self.save_stack(TrieNode::Leaf { path, value }, &mut ops)?,
            Some(node) => self.insert_into(node, &path, value, &mut ops)?,
        };
        let new_root = self.finalize_root_ref(new_root_ref, &mut ops)?;
        self.orphan_old_root(&mut ops, root, new_root);
        self.store.batch(ops)?;
        self.set_root(new_root)
    }

    /// Same as [`Self::put_at_path`] but for callers (range-proof
    /// verification) that already hold a routed path and must acquire the
    /// mutation gate themselves, since they are not going through `put`.
    pub(crate) fn put_at_path_locked(&self, path: Nibbles, value: Vec<u8>) -> Result<(), TrieError> {
        let _guard = self.mutate_gate.lock().expect("mutate gate poisoned");
        self.put_at_path(path, value)
    }

    fn del_locked(&self, key: &[u8]) -> Result<(), TrieError> {
        self.check_not_reserved(key)?;
        let path = self.route(key);
        let root = self.root();
        let root_node = match self.root_node(&root)? {
            None => return Ok(()),
            Some(n) => n,
        };
        if self.get_at(&root_node, &path)?.is_none() {
            return Ok(());
        }
        let mut ops = Vec::new();
        let new_root_ref = self.remove_from(root_node, &path, &mut ops)?;
        let new_root = match new_root_ref {
            None => hash::empty_root(self.config.hasher.as_ref()),
            Some(node_ref) => self.finalize_root_ref(node_ref, &mut ops)?,
        };
        self.orphan_old_root(&mut ops, root, new_root);
        self.store.batch(ops)?;
        self.set_root(new_root)
    }

    /// Queue a delete for the previous root's node body once it has been
    /// superseded, mirroring what `insert`/`remove` already do for every
    /// non-root ancestor. The root never had an inline form (see
    /// `finalize_root_ref`), so this is always a plain hash delete.
    fn orphan_old_root(&self, ops: &mut Vec<StoreOp>, old_root: Hash, new_root: Hash) {
        let was_empty = old_root == hash::empty_root(self.config.hasher.as_ref());
        if self.config.delete_on_write && !was_empty && old_root != new_root {
            ops.push(StoreOp::Delete(old_root.to_vec()));
        }
    }

    fn set_root(&self, new_root: Hash) -> Result<(), TrieError> {
        if self.config.persist_root {
            self.store.put(ROOT_DB_KEY.to_vec(), new_root.to_vec())?;
        }
        *self.root.write().expect("root lock poisoned") = new_root;
        Ok(())
    }

    /// Persist `node` under its content hash, or leave it inline if small
    /// enough (§3 invariant 7), by queuing a `put` op rather than writing
    /// to the store directly. Called once per ancestor level as
    /// `insert`/`remove` unwind back toward the root; every op queued by a
    /// single `put`/`del` is flushed through one `store.batch()` call.
    fn save_stack(&self, node: TrieNode, ops: &mut Vec<StoreOp>) -> Result<NodeRef, TrieError> {
        let encoded = node.serialize();
        if is_raw_ref(&encoded) {
            Ok(NodeRef::Inline(Box::new(node)))
        } else {
            let h = self.config.hasher.hash(&encoded);
            ops.push(StoreOp::Put(h.to_vec(), encoded));
            Ok(NodeRef::Hash(h))
        }
    }

    /// The root is always content-addressed regardless of its serialized
    /// size — it has no parent to inline into, and callers need a fixed
    /// 32-byte handle to reopen the trie by.
    fn finalize_root_ref(&self, node_ref: NodeRef, ops: &mut Vec<StoreOp>) -> Result<Hash, TrieError> {
        match node_ref {
            NodeRef::Hash(h) => Ok(h),
            NodeRef::Inline(node) => {
                let encoded = node.serialize();
                let h = self.config.hasher.hash(&encoded);
                ops.push(StoreOp::Put(h.to_vec(), encoded));
                Ok(h)
            }
        }
    }

    /// Rebuild `ext_path`'s reference to `child_ref`, merging the child
    /// into this extension's path if it collapsed to a Leaf or Extension
    /// (an Extension's child must always be a Branch — §3 invariant).
    fn merge_extension(
        &self,
        ext_path: Nibbles,
        child_ref: NodeRef,
        ops: &mut Vec<StoreOp>,
    ) -> Result<NodeRef, TrieError> {
        let child_node = self.resolve(&child_ref)?;
        match child_node {
            TrieNode::Leaf { path, value } => {
                self.save_stack(TrieNode::Leaf { path: ext_path.concat(&path), value }, ops)
            }
            TrieNode::Extension { path, child } => {
                self.save_stack(TrieNode::Extension { path: ext_path.concat(&path), child }, ops)
            }
            TrieNode::Branch { .. } => {
                self.save_stack(TrieNode::Extension { path: ext_path, child: child_ref }, ops)
            }
        }
    }

    /// Orphan `old_hash`'s node body once `new_ref` has taken its place,
    /// when `deleteOnWrite` is enabled and the replacement actually
    /// differs (an overwrite with an unchanged value re-serializes to the
    /// same bytes and the same hash, and must not delete what was just
    /// written).
    fn orphan_if_replaced(&self, ops: &mut Vec<StoreOp>, old_hash: &Hash, new_ref: &NodeRef) {
        if !self.config.delete_on_write {
            return;
        }
        let superseded = match new_ref {
            NodeRef::Hash(new_hash) => new_hash != old_hash,
            NodeRef::Inline(_) => true,
        };
        if superseded {
            ops.push(StoreOp::Delete(old_hash.to_vec()));
        }
    }

    fn insert(
        &self,
        node_ref: Option<NodeRef>,
        path: &Nibbles,
        value: Vec<u8>,
        ops: &mut Vec<StoreOp>,
    ) -> Result<NodeRef, TrieError> {
        match node_ref {
            None => self.save_stack(TrieNode::Leaf { path: path.clone(), value }, ops),
            Some(NodeRef::Hash(h)) => {
                let bytes = self.store.get(&h)?.ok_or_else(|| TrieError::missing_node(&h))?;
                let new_ref = self.insert_into(TrieNode::decode(&bytes)?, path, value, ops)?;
                self.orphan_if_replaced(ops, &h, &new_ref);
                Ok(new_ref)
            }
            Some(NodeRef::Inline(n)) => self.insert_into(*n, path, value, ops),
        }
    }

    fn insert_into(
        &self,
        node: TrieNode,
        path: &Nibbles,
        value: Vec<u8>,
        ops: &mut Vec<StoreOp>,
    ) -> Result<NodeRef, TrieError> {
        match node {
            TrieNode::Leaf { path: leaf_path, value: leaf_value } => {
                if leaf_path == *path {
                    self.save_stack(TrieNode::Leaf { path: leaf_path, value }, ops)
                } else {
                    self.build_branch(leaf_path, leaf_value, path.clone(), value, ops)
                }
            }

            TrieNode::Extension { path: ext_path, child } => {
                let common = path.common_prefix_len(&ext_path);
                if common == ext_path.len() {
                    let rest = path.slice(common);
                    let new_child = self.insert(Some(child), &rest, value, ops)?;
                    self.merge_extension(ext_path, new_child, ops)
                } else {
                    self.split_extension(ext_path, child, common, path.clone(), value, ops)
                }
            }

            TrieNode::Branch { mut children, value: branch_value } => {
                if path.is_empty() {
                    self.save_stack(TrieNode::Branch { children, value: Some(value) }, ops)
                } else {
                    let nibble = path.at(0) as usize;
                    let rest = path.slice(1);
                    let existing = children[nibble].take();
                    let new_child = self.insert(existing, &rest, value, ops)?;
                    children[nibble] = Some(new_child);
                    self.save_stack(TrieNode::Branch { children, value: branch_value }, ops)
                }
            }
        }
    }

    /// Split two entries that share no further structure (two Leaf keys
    /// diverging, or a Leaf diverging from a just-inserted path) into a
    /// Branch, wrapped in an Extension over their common prefix if any.
    fn build_branch(
        &self,
        a_path: Nibbles,
        a_value: Vec<u8>,
        b_path: Nibbles,
        b_value: Vec<u8>,
        ops: &mut Vec<StoreOp>,
    ) -> Result<NodeRef, TrieError> {
        let common = a_path.common_prefix_len(&b_path);
        let mut children: [Option<NodeRef>; 16] = Default::default();
        let mut branch_value = None;

        for (path, value) in [(a_path.slice(common), a_value), (b_path.slice(common), b_value)] {
            if path.is_empty() {
                branch_value = Some(value);
            } else {
                let nibble = path.at(0) as usize;
                let leaf = TrieNode::Leaf { path: path.slice(1), value };
                children[nibble] = Some(self.save_stack(leaf, ops)?);
            }
        }

        let branch_ref = self.save_stack(TrieNode::Branch { children: Box::new(children), value: branch_value }, ops)?;

        if common == 0 {
            Ok(branch_ref)
        } else {
            self.save_stack(TrieNode::Extension { path: a_path.slice_range(0, common), child: branch_ref }, ops)
        }
    }

    /// Split an Extension whose path diverges from the inserted path at
    /// `common` nibbles in.
    fn split_extension(
        &self,
        ext_path: Nibbles,
        child: NodeRef,
        common: usize,
        new_path: Nibbles,
        value: Vec<u8>,
        ops: &mut Vec<StoreOp>,
    ) -> Result<NodeRef, TrieError> {
        let mut children: [Option<NodeRef>; 16] = Default::default();
        let mut branch_value = None;

        let ext_rest = ext_path.slice(common);
        let ext_nibble = ext_rest.at(0) as usize;
        let ext_suffix = ext_rest.slice(1);
        children[ext_nibble] = Some(if ext_suffix.is_empty() {
            child
        } else {
            self.save_stack(TrieNode::Extension { path: ext_suffix, child }, ops)?
        });

        let new_rest = new_path.slice(common);
        if new_rest.is_empty() {
            branch_value = Some(value);
        } else {
            let new_nibble = new_rest.at(0) as usize;
            let leaf = TrieNode::Leaf { path: new_rest.slice(1), value };
            children[new_nibble] = Some(self.save_stack(leaf, ops)?);
        }

        let branch_ref = self.save_stack(TrieNode::Branch { children: Box::new(children), value: branch_value }, ops)?;

        if common == 0 {
            Ok(branch_ref)
        } else {
            self.save_stack(TrieNode::Extension { path: ext_path.slice_range(0, common), child: branch_ref }, ops)
        }
    }

    /// Remove `path` from `node`, assuming the caller already confirmed it
    /// is present. Returns `None` if the subtree became empty.
    fn remove_from(
        &self,
        node: TrieNode,
        path: &Nibbles,
        ops: &mut Vec<StoreOp>,
    ) -> Result<Option<NodeRef>, TrieError> {
        match node {
            TrieNode::Leaf { path: leaf_path, .. } => {
                if leaf_path != *path {
                    panic!("{}", TrieError::stack_underflow_message());
                }
                Ok(None)
            }

            TrieNode::Extension { path: ext_path, child } => {
                if !path.starts_with(&ext_path) {
                    panic!("{}", TrieError::stack_underflow_message());
                }
                let rest = path.slice(ext_path.len());
                match self.remove(Some(child), &rest, ops)? {
                    None => Ok(None),
                    Some(child_ref) => Ok(Some(self.merge_extension(ext_path, child_ref, ops)?)),
                }
            }

            TrieNode::Branch { mut children, value } => {
                if path.is_empty() {
                    self.collapse_branch(children, None, ops)
                } else {
                    let nibble = path.at(0) as usize;
                    let rest = path.slice(1);
                    let existing = children[nibble].take();
                    let new_child = self.remove(existing, &rest, ops)?;
                    children[nibble] = new_child;
                    self.collapse_branch(children, value, ops)
                }
            }
        }
    }

    fn remove(
        &self,
        node_ref: Option<NodeRef>,
        path: &Nibbles,
        ops: &mut Vec<StoreOp>,
    ) -> Result<Option<NodeRef>, TrieError> {
        match node_ref {
            None => panic!("{}", TrieError::stack_underflow_message()),
            Some(NodeRef::Hash(h)) => {
                let bytes = self.store.get(&h)?.ok_or_else(|| TrieError::missing_node(&h))?;
                let result = self.remove_from(TrieNode::decode(&bytes)?, path, ops)?;
                // The key was confirmed present under this hash by the
                // caller, so this node's body is always superseded —
                // either rebuilt into something different or dropped.
                if self.config.delete_on_write {
                    ops.push(StoreOp::Delete(h.to_vec()));
                }
                Ok(result)
            }
            Some(NodeRef::Inline(n)) => self.remove_from(*n, path, ops),
        }
    }

    /// After removing a value or child from a Branch, collapse it if it no
    /// longer has enough meaningful entries to justify being a Branch
    /// (§3 invariant: at least two of {value, 16 children} present).
    fn collapse_branch(
        &self,
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
        ops: &mut Vec<StoreOp>,
    ) -> Result<Option<NodeRef>, TrieError> {
        let present: Vec<(u8, NodeRef)> = children
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.clone().map(|r| (i as u8, r)))
            .collect();
        let entry_count = present.len() + usize::from(value.is_some());

        if entry_count >= 2 {
            return Ok(Some(self.save_stack(TrieNode::Branch { children, value }, ops)?));
        }
        if entry_count == 0 {
            return Ok(None);
        }

        if let Some(v) = value {
            return Ok(Some(self.save_stack(TrieNode::Leaf { path: Nibbles::default(), value: v }, ops)?));
        }

        let (nibble, child_ref) = present.into_iter().next().expect("entry_count == 1 implies one present slot");
        let child_node = self.resolve(&child_ref)?;
        let merged = match child_node {
            TrieNode::Leaf { path, value } => TrieNode::Leaf { path: Nibbles::prepend(nibble, &path), value },
            TrieNode::Extension { path, child } => {
                TrieNode::Extension { path: Nibbles::prepend(nibble, &path), child }
            }
            TrieNode::Branch { .. } => TrieNode::Extension { path: Nibbles(vec![nibble]), child: child_ref },
        };
        Ok(Some(self.save_stack(merged, ops)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryStore;
    use crate::domain::primitives::KECCAK_EMPTY_ROOT;

    fn new_trie() -> Trie<InMemoryStore> {
        Trie::new(InMemoryStore::new())
    }

    #[test]
    fn empty_trie_has_well_known_root() {
        assert_eq!(new_trie().root(), KECCAK_EMPTY_ROOT);
    }

    #[test]
    fn put_then_get_roundtrips() {
        let trie = new_trie();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        assert_eq!(trie.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
        assert_eq!(trie.get(b"cat").unwrap(), None);
    }

    #[test]
    fn put_overwrites_existing_value() {
        let trie = new_trie();
        trie.put(b"k", b"v1".to_vec()).unwrap();
        trie.put(b"k", b"v2".to_vec()).unwrap();
        assert_eq!(trie.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn diverging_keys_split_into_a_branch() {
        let trie = new_trie();
        trie.put(b"do", b"verb".to_vec()).unwrap();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        trie.put(b"doge", b"coin".to_vec()).unwrap();
        trie.put(b"horse", b"stallion".to_vec()).unwrap();

        assert_eq!(trie.get(b"do").unwrap(), Some(b"verb".to_vec()));
        assert_eq!(trie.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
        assert_eq!(trie.get(b"doge").unwrap(), Some(b"coin".to_vec()));
        assert_eq!(trie.get(b"horse").unwrap(), Some(b"stallion".to_vec()));
    }

    #[test]
    fn order_of_insertion_does_not_affect_root() {
        let a = new_trie();
        let b = new_trie();
        let pairs = [("do", "verb"), ("dog", "puppy"), ("horse", "stallion"), ("doge", "coin")];
        for (k, v) in pairs {
            a.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
        }
        for (k, v) in pairs.iter().rev() {
            b.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
        }
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn delete_restores_prior_root() {
        let trie = new_trie();
        let empty_root = trie.root();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let one_root = trie.root();
        trie.put(b"doge", b"coin".to_vec()).unwrap();
        trie.del(b"doge").unwrap();
        assert_eq!(trie.root(), one_root);
        trie.del(b"dog").unwrap();
        assert_eq!(trie.root(), empty_root);
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let trie = new_trie();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let root_before = trie.root();
        trie.del(b"cat").unwrap();
        assert_eq!(trie.root(), root_before);
    }

    #[test]
    fn reserved_key_is_rejected() {
        let trie = new_trie();
        assert!(matches!(trie.put(ROOT_DB_KEY, vec![1]), Err(TrieError::ReservedKey)));
        assert!(matches!(trie.del(ROOT_DB_KEY), Err(TrieError::ReservedKey)));
    }

    #[test]
    fn persist_root_round_trips_through_open() {
        let config = TrieConfig { persist_root: true, ..TrieConfig::default() };
        let store = InMemoryStore::new();
        {
            let trie = Trie::with_config(store.clone(), config.clone());
            trie.put(b"dog", b"puppy".to_vec()).unwrap();
        }
        let reopened = Trie::open(store, config).unwrap();
        assert_eq!(reopened.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
    }

    #[test]
    fn copy_is_independent_of_source_trie() {
        let trie = new_trie();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let copy = trie.copy();
        trie.put(b"doge", b"coin".to_vec()).unwrap();
        assert_eq!(copy.get(b"doge").unwrap(), None);
        assert_eq!(copy.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
    }

    #[test]
    fn batch_put_and_delete_apply_together() {
        let trie = new_trie();
        trie.put(b"a", b"1".to_vec()).unwrap();
        trie.batch(vec![
            BatchOp::Put(b"b".to_vec(), b"2".to_vec()),
            BatchOp::Delete(b"a".to_vec()),
        ])
        .unwrap();
        assert_eq!(trie.get(b"a").unwrap(), None);
        assert_eq!(trie.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn batch_rejects_empty_value_put() {
        let trie = new_trie();
        let err = trie.batch(vec![BatchOp::Put(b"a".to_vec(), vec![])]).unwrap_err();
        assert!(matches!(err, TrieError::InvalidBatchOp));
    }

    #[test]
    fn find_path_returns_root_to_leaf_nodes() {
        let trie = new_trie();
        trie.put(b"do", b"verb".to_vec()).unwrap();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let result = trie.find_path(b"dog").unwrap();
        assert_eq!(result.value, Some(b"puppy".to_vec()));
        assert!(!result.nodes.is_empty());
    }

    #[test]
    fn put_with_empty_value_behaves_like_delete() {
        let trie = new_trie();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let root_with_entry = trie.root();
        assert_ne!(root_with_entry, KECCAK_EMPTY_ROOT);

        trie.put(b"dog", Vec::new()).unwrap();
        assert_eq!(trie.root(), KECCAK_EMPTY_ROOT);
        assert_eq!(trie.get(b"dog").unwrap(), None);
    }

    #[test]
    fn delete_on_write_orphans_superseded_node_bodies() {
        let config = TrieConfig { delete_on_write: true, ..TrieConfig::default() };
        let store = InMemoryStore::new();
        let trie = Trie::with_config(store.clone(), config);

        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let first_root = trie.root();
        assert!(store.get(&first_root).unwrap().is_some());

        trie.put(b"doge", b"coin".to_vec()).unwrap();
        assert_ne!(trie.root(), first_root);
        assert!(
            store.get(&first_root).unwrap().is_none(),
            "superseded root body should have been deleted"
        );

        trie.del(b"doge").unwrap();
        assert_eq!(trie.root(), first_root);
    }

    #[test]
    fn delete_on_write_does_not_orphan_an_unchanged_overwrite() {
        let config = TrieConfig { delete_on_write: true, ..TrieConfig::default() };
        let store = InMemoryStore::new();
        let trie = Trie::with_config(store.clone(), config);

        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        let root = trie.root();
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        assert_eq!(trie.root(), root);
        assert!(store.get(&root).unwrap().is_some());
    }
}
