//! # Domain layer: the trie itself
//!
//! Pure domain logic, independent of any concrete storage backend.
//!
//! - `primitives`: fixed-width types and well-known constants
//! - `nibbles`: nibble-path routing and Hex-Prefix encoding (C1)
//! - `rlp` / `node`: the RLP codec and node model (C2)
//! - `hash`: the pluggable hash function
//! - `config`: construction-time trie options
//! - `walker`: queue-driven subtree walk used by range proofs (C4)
//! - `trie`: the trie engine itself — get/put/del/find_path (C5)
//! - `proofs`: point and range proof creation/verification (C6)
//! - `iter`: lazy in-order iteration (C7)
//! - `errors`: domain error types

pub mod config;
pub mod errors;
pub mod hash;
pub mod iter;
pub mod nibbles;
pub mod node;
pub mod primitives;
pub mod proofs;
pub mod rlp;
pub mod trie;
pub mod walker;

pub use config::TrieConfig;
pub use errors::TrieError;
pub use hash::{Hasher, Keccak256Hasher};
pub use iter::TrieIterator;
pub use nibbles::Nibbles;
pub use node::{NodeRef, TrieNode};
pub use primitives::{Hash, HASH_LEN, KECCAK_EMPTY_ROOT, ROOT_DB_KEY};
pub use proofs::{create_proof, create_range_proof, verify_proof, verify_range_proof};
pub use trie::{BatchOp, PathResult, Trie};
