//! Queue-driven walk controller (C4).
//!
//! A breadth-first traversal used wherever a caller needs every key/value
//! pair reachable under a subtree rather than a single routed path — range
//! proof construction gathers its window this way. Order of discovery is
//! not significant to callers of this controller (range-proof assembly
//! sorts the results itself); [`crate::domain::iter`] implements the
//! separate ordered iteration stream.

use std::collections::VecDeque;

use crate::domain::nibbles::Nibbles;
use crate::domain::node::{NodeRef, TrieNode};
use crate::domain::TrieError;
use crate::ports::KvStore;

struct QueueEntry {
    prefix: Nibbles,
    node: TrieNode,
}

/// Drives a breadth-first walk over a trie's nodes, resolving hash
/// references through `store` on demand.
pub struct WalkController<'a> {
    store: &'a dyn KvStore,
    queue: VecDeque<QueueEntry>,
}

impl<'a> WalkController<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self {
            store,
            queue: VecDeque::new(),
        }
    }

    /// Seed the walk with the already-resolved root node.
    pub fn seed(&mut self, root_node: TrieNode) {
        self.queue.push_back(QueueEntry {
            prefix: Nibbles::default(),
            node: root_node,
        });
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

    /// Enqueue every present child of a branch, each tagged with its
    /// selecting nibble appended to `prefix`.
    pub fn all_children(
        &mut self,
        prefix: &Nibbles,
        children: &[Option<NodeRef>; 16],
    ) -> Result<(), TrieError> {
        for (nibble, slot) in children.iter().enumerate() {
            if let Some(child_ref) = slot {
                let child_node = self.resolve(child_ref)?;
                let child_prefix = prefix.concat(&Nibbles(vec![nibble as u8]));
                self.queue.push_back(QueueEntry {
                    prefix: child_prefix,
                    node: child_node,
                });
            }
        }
        Ok(())
    }

    /// Enqueue only the branch child selected by `nibble` — used when the
    /// walk is pruning to a single known subtree rather than exploring the
    /// whole branch.
    pub fn only_branch(
        &mut self,
        prefix: &Nibbles,
        children: &[Option<NodeRef>; 16],
        nibble: u8,
    ) -> Result<(), TrieError> {
        if let Some(child_ref) = &children[nibble as usize] {
            let child_node = self.resolve(child_ref)?;
            let child_prefix = prefix.concat(&Nibbles(vec![nibble]));
            self.queue.push_back(QueueEntry {
                prefix: child_prefix,
                node: child_node,
            });
        }
        Ok(())
    }

    /// Drain the queue, invoking `on_found` for every full key/value pair
    /// encountered and enqueueing further descendants as they're found.
    pub fn run(mut self, mut on_found: impl FnMut(Nibbles, Vec<u8>)) -> Result<(), TrieError> {
        while let Some(entry) = self.queue.pop_front() {
            match entry.node {
                TrieNode::Leaf { path, value } => {
                    on_found(entry.prefix.concat(&path), value);
                }
                TrieNode::Extension { path, child } => {
                    let child_node = self.resolve(&child)?;
                    let child_prefix = entry.prefix.concat(&path);
                    self.queue.push_back(QueueEntry {
                        prefix: child_prefix,
                        node: child_node,
                    });
                }
                TrieNode::Branch { children, value } => {
                    if let Some(v) = value {
                        on_found(entry.prefix.clone(), v);
                    }
                    self.all_children(&entry.prefix, &children)?;
                }
            }
        }
        Ok(())
    }
}
