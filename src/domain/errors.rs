//! # Trie Error Types
//!
//! Defines every error condition the trie can surface. Non-internal
//! variants are recoverable and must never mutate `root` before being
//! returned (§7 of the design doc). `StackUnderflow` is the one exception:
//! it marks an internal invariant breach, and the engine panics on it
//! rather than returning it to a caller.

use thiserror::Error;

/// Errors produced by trie operations.
///
/// All variants except [`TrieError::ReservedKey`]/[`TrieError::InvalidBatchOp`]
/// are recoverable from the caller's perspective; none of them leave `root`
/// mutated when returned from `put`/`del`.
#[derive(Debug, Error)]
pub enum TrieError {
    /// A supplied root (or a hash read back from the store) was not
    /// exactly `HASH_LEN` bytes.
    #[error("invalid root: expected {expected} bytes, got {actual}")]
    InvalidRoot { expected: usize, actual: usize },

    /// A node referenced by hash was not found in the store.
    #[error("missing node for hash {0}")]
    MissingNode(String),

    /// Attempted to `put`/`del` the reserved root-persistence key.
    #[error("key is reserved for root persistence")]
    ReservedKey,

    /// A `put` operation inside a `batch()` carried an empty value.
    #[error("batch put with empty value is not allowed; use del instead")]
    InvalidBatchOp,

    /// A proof did not authenticate the claim it was checked against.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The underlying KV store reported a failure.
    #[error("store error: {0}")]
    Store(String),

    /// RLP decoding failed: truncated input, malformed length header, or
    /// a node body that does not round-trip to a valid [`super::TrieNode`].
    #[error("rlp decode error: {0}")]
    Codec(String),

    /// A key the caller already confirmed present vanished partway through
    /// a `del` walk — corrupted trie structure, not a normal failure. Never
    /// constructed as a `Result`; the engine panics on it immediately via
    /// [`TrieError::stack_underflow_message`] so every panic site carries
    /// the same message instead of three independently drifting literals.
    #[error("del: key vanished during removal — trie invariant violated")]
    StackUnderflow,
}

impl TrieError {
    pub(crate) fn missing_node(hash: &[u8]) -> Self {
        let hex_hash = hex::encode(hash);
        tracing::warn!(hash = %hex_hash, "trie node missing from store");
        TrieError::MissingNode(hex_hash)
    }

    /// Message used by every `del`-invariant panic site, so they can't drift
    /// apart from [`TrieError::StackUnderflow`]'s own `Display` text.
    pub(crate) fn stack_underflow_message() -> String {
        TrieError::StackUnderflow.to_string()
    }
}
