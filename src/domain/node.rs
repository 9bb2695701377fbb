//! # Node model & RLP codec (C2)
//!
//! Three node kinds: Leaf, Extension, Branch. There is no `Empty` variant —
//! an empty subtree is represented by the absence of a [`NodeRef`] (a `None`
//! branch slot, or the trie root being the empty-trie hash) rather than by a
//! node value, matching the wire format (an empty child is encoded as the
//! RLP empty string, never as its own node).

use crate::domain::hash::Hasher;
use crate::domain::nibbles::Nibbles;
use crate::domain::primitives::{Hash, HASH_LEN};
use crate::domain::rlp::{self, RlpItem};
use crate::domain::TrieError;

/// A reference to a child node: either its content hash (the child is
/// stored separately) or the child itself (small enough to inline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Hash(Hash),
    Inline(Box<TrieNode>),
}

impl NodeRef {
    /// Build the correct kind of reference for `node`: inlined if its
    /// serialized form is under [`HASH_LEN`], otherwise a hash reference
    /// (which requires `node` to have already been persisted under that
    /// hash by the caller).
    pub fn for_node(node: TrieNode, hasher: &dyn Hasher) -> Self {
        let encoded = node.serialize();
        if is_raw_ref(&encoded) {
            NodeRef::Inline(Box::new(node))
        } else {
            NodeRef::Hash(hasher.hash(&encoded))
        }
    }

    /// RLP encoding of this reference as it appears inside a parent node's
    /// item list: a 32-byte string for a hash, or the child's own raw
    /// (already a list) encoding for an inline child.
    fn encode(&self) -> Vec<u8> {
        match self {
            NodeRef::Hash(h) => rlp::encode_bytes(h),
            NodeRef::Inline(node) => node.serialize(),
        }
    }

    fn decode(item: &RlpItem) -> Result<Option<Self>, TrieError> {
        match item {
            RlpItem::List(_) => Ok(Some(NodeRef::Inline(Box::new(TrieNode::decode_raw(item)?)))),
            RlpItem::Bytes(b) if b.is_empty() => Ok(None),
            RlpItem::Bytes(b) if b.len() == HASH_LEN => {
                let mut hash = [0u8; HASH_LEN];
                hash.copy_from_slice(b);
                Ok(Some(NodeRef::Hash(hash)))
            }
            RlpItem::Bytes(b) => Err(TrieError::Codec(format!(
                "invalid node reference length {}",
                b.len()
            ))),
        }
    }
}

/// True if an already-RLP-encoded node body is small enough to be embedded
/// in its parent rather than stored under its own hash (§3 invariant 7).
pub fn is_raw_ref(encoded: &[u8]) -> bool {
    encoded.len() < HASH_LEN
}

/// A trie node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Remaining path to a value, RLP: `[hex_prefix(path, true), value]`.
    Leaf { path: Nibbles, value: Vec<u8> },

    /// Shared-prefix optimization over a single child, RLP:
    /// `[hex_prefix(path, false), child]`.
    Extension { path: Nibbles, child: NodeRef },

    /// 16-way branch plus an optional value terminating at this node, RLP:
    /// `[child_0, .., child_15, value]`.
    Branch {
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl TrieNode {
    /// Canonical RLP encoding of this node, used both for hashing and for
    /// embedding as an inline child.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            TrieNode::Leaf { path, value } => {
                let encoded_path = rlp::encode_bytes(&path.encode_hex_prefix(true));
                let encoded_value = rlp::encode_bytes(value);
                rlp::encode_list(&[encoded_path, encoded_value])
            }

            TrieNode::Extension { path, child } => {
                let encoded_path = rlp::encode_bytes(&path.encode_hex_prefix(false));
                rlp::encode_list(&[encoded_path, child.encode()])
            }

            TrieNode::Branch { children, value } => {
                let mut items: Vec<Vec<u8>> = Vec::with_capacity(17);
                for slot in children.iter() {
                    items.push(match slot {
                        Some(child_ref) => child_ref.encode(),
                        None => rlp::encode_bytes(&[]),
                    });
                }
                items.push(match value {
                    Some(v) => rlp::encode_bytes(v),
                    None => rlp::encode_bytes(&[]),
                });
                rlp::encode_list(&items)
            }
        }
    }

    /// Hash this node under `hasher`. Distinct from `NodeRef::for_node`,
    /// which additionally decides whether the node should be inlined.
    pub fn hash(&self, hasher: &dyn Hasher) -> Hash {
        hasher.hash(&self.serialize())
    }

    /// Decode a node from its stored (top-level) RLP encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, TrieError> {
        let item = rlp::decode_exact(bytes)?;
        Self::decode_raw(&item)
    }

    /// Decode a node from an already-parsed RLP item — used both by
    /// [`Self::decode`] and to recurse into inline children, which never
    /// have their own top-level-decode boundary.
    pub fn decode_raw(item: &RlpItem) -> Result<Self, TrieError> {
        let items = item.as_list()?;
        match items.len() {
            2 => {
                let path_bytes = items[0].as_bytes()?;
                let (path, terminator) = Nibbles::decode_hex_prefix(path_bytes);
                if terminator {
                    Ok(TrieNode::Leaf {
                        path,
                        value: items[1].as_bytes()?.to_vec(),
                    })
                } else {
                    let child = NodeRef::decode(&items[1])?.ok_or_else(|| {
                        TrieError::Codec("extension node missing child".into())
                    })?;
                    Ok(TrieNode::Extension { path, child })
                }
            }
            17 => {
                let mut children: [Option<NodeRef>; 16] = Default::default();
                for (i, slot) in children.iter_mut().enumerate() {
                    *slot = NodeRef::decode(&items[i])?;
                }
                let value = items[16].as_bytes()?;
                Ok(TrieNode::Branch {
                    children: Box::new(children),
                    value: if value.is_empty() {
                        None
                    } else {
                        Some(value.to_vec())
                    },
                })
            }
            n => Err(TrieError::Codec(format!(
                "node must have 2 or 17 items, got {n}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash::Keccak256Hasher;

    #[test]
    fn leaf_hash_is_deterministic() {
        let leaf = TrieNode::Leaf {
            path: Nibbles(vec![1, 2, 3, 4]),
            value: vec![0xAB, 0xCD],
        };
        assert_eq!(leaf.hash(&Keccak256Hasher), leaf.hash(&Keccak256Hasher));
    }

    #[test]
    fn leaf_roundtrips_through_serialize() {
        let leaf = TrieNode::Leaf {
            path: Nibbles(vec![1, 2, 3]),
            value: vec![0xAB, 0xCD, 0xEF],
        };
        let decoded = TrieNode::decode(&leaf.serialize()).unwrap();
        assert_eq!(decoded, leaf);
    }

    #[test]
    fn extension_roundtrips_with_hash_child() {
        let ext = TrieNode::Extension {
            path: Nibbles(vec![1, 2]),
            child: NodeRef::Hash([7u8; 32]),
        };
        let decoded = TrieNode::decode(&ext.serialize()).unwrap();
        assert_eq!(decoded, ext);
    }

    #[test]
    fn branch_roundtrips_with_mixed_children() {
        let mut children: [Option<NodeRef>; 16] = Default::default();
        children[0] = Some(NodeRef::Hash([1u8; 32]));
        children[5] = Some(NodeRef::Inline(Box::new(TrieNode::Leaf {
            path: Nibbles(vec![9]),
            value: vec![1],
        })));
        let branch = TrieNode::Branch {
            children: Box::new(children),
            value: Some(vec![0xFF]),
        };
        let decoded = TrieNode::decode(&branch.serialize()).unwrap();
        assert_eq!(decoded, branch);
    }

    #[test]
    fn small_node_is_inlined_not_hashed() {
        let leaf = TrieNode::Leaf {
            path: Nibbles(vec![1]),
            value: vec![1],
        };
        let encoded = leaf.serialize();
        assert!(is_raw_ref(&encoded));
        match NodeRef::for_node(leaf.clone(), &Keccak256Hasher) {
            NodeRef::Inline(n) => assert_eq!(*n, leaf),
            NodeRef::Hash(_) => panic!("expected inline reference"),
        }
    }

    #[test]
    fn large_node_is_hashed_not_inlined() {
        let branch = TrieNode::Branch {
            children: Box::new(Default::default()),
            value: Some(vec![0xAB; 64]),
        };
        match NodeRef::for_node(branch, &Keccak256Hasher) {
            NodeRef::Hash(_) => {}
            NodeRef::Inline(_) => panic!("expected hash reference"),
        }
    }
}
