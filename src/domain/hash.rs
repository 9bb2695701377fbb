//! Pluggable hash function (part of C2/§6).
//!
//! The trie is parameterized over a hash function so callers can swap in a
//! deterministic test double without touching the engine. Production code
//! uses [`Keccak256Hasher`].

use sha3::{Digest, Keccak256};

use crate::domain::primitives::Hash;
use crate::domain::rlp;

/// A hash function suitable for content-addressing trie nodes.
///
/// Implementations must be deterministic and collision-resistant; the trie's
/// integrity guarantees hold only as well as the hasher's.
pub trait Hasher: Send + Sync {
    fn hash(&self, data: &[u8]) -> Hash;
}

/// Default production hasher: Keccak-256 (note — not NIST SHA3-256; same
/// sponge construction, different padding).
#[derive(Clone, Copy, Debug, Default)]
pub struct Keccak256Hasher;

impl Hasher for Keccak256Hasher {
    fn hash(&self, data: &[u8]) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}

/// The root hash of a trie with no entries under `hasher`, i.e.
/// `hasher.hash(RLP(""))`.
pub fn empty_root(hasher: &dyn Hasher) -> Hash {
    hasher.hash(&rlp::encode_bytes(&[]))
}
