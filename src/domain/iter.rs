//! Lazy in-order iteration stream (C7).
//!
//! Walks the trie depth-first with an explicit stack rather than
//! recursion, resolving each node only when it is actually reached —
//! nothing beyond the current path is ever read from the store ahead of
//! time. Branch children are pushed high-nibble-first so popping the stack
//! yields ascending nibble order, which is the trie's natural key order.

use crate::domain::nibbles::Nibbles;
use crate::domain::node::{NodeRef, TrieNode};
use crate::domain::TrieError;
use crate::ports::KvStore;

pub struct TrieIterator<'a> {
    store: &'a dyn KvStore,
    stack: Vec<(Nibbles, TrieNode)>,
}

impl<'a> TrieIterator<'a> {
    pub fn new(store: &'a dyn KvStore, root_node: Option<TrieNode>) -> Self {
        let mut stack = Vec::new();
        if let Some(node) = root_node {
            stack.push((Nibbles::default(), node));
        }
        Self { store, stack }
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
}

impl<'a> Iterator for TrieIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>), TrieError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((prefix, node)) = self.stack.pop() {
            match node {
                TrieNode::Leaf { path, value } => {
                    return Some(Ok((prefix.concat(&path).to_bytes(), value)));
                }

                TrieNode::Extension { path, child } => match self.resolve(&child) {
                    Ok(child_node) => self.stack.push((prefix.concat(&path), child_node)),
                    Err(e) => return Some(Err(e)),
                },

                TrieNode::Branch { children, value } => {
                    for nibble in (0..16).rev() {
                        if let Some(child_ref) = &children[nibble] {
                            match self.resolve(child_ref) {
                                Ok(child_node) => {
                                    let child_prefix = prefix.concat(&Nibbles(vec![nibble as u8]));
                                    self.stack.push((child_prefix, child_node));
                                }
                                Err(e) => return Some(Err(e)),
                            }
                        }
                    }
                    if let Some(v) = value {
                        return Some(Ok((prefix.to_bytes(), v)));
                    }
                }
            }
        }
        None
    }
}
