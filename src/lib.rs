//! # merkle-patricia-trie
//!
//! A persistent, cryptographically authenticated key-value map, rooted in
//! a Keccak-256 digest over canonically RLP-encoded nodes — the same
//! Modified Merkle-Patricia Trie structure Ethereum uses for account and
//! storage state.
//!
//! ## Layout
//!
//! - [`ports`]: the [`ports::KvStore`] abstraction the trie is generic
//!   over (C3) — bring your own backing store.
//! - [`adapters`]: [`adapters::InMemoryStore`], a reference `KvStore`.
//! - [`domain`]: nibble routing (C1), the RLP codec and node model (C2),
//!   the pluggable hasher, the walk controller (C4), the trie engine
//!   itself (C5), Merkle proofs (C6), and ordered iteration (C7).
//!
//! ## Example
//!
//! ```
//! use merkle_patricia_trie::adapters::InMemoryStore;
//! use merkle_patricia_trie::domain::Trie;
//!
//! let trie = Trie::new(InMemoryStore::new());
//! trie.put(b"dog", b"puppy".to_vec()).unwrap();
//! assert_eq!(trie.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
//! ```
//!
//! ## Non-goals
//!
//! This crate implements the trie itself only. It does not model
//! accounts, blocks, consensus, or any blockchain-specific state layout —
//! those belong in a layer built on top.

pub mod adapters;
pub mod domain;
pub mod ports;
