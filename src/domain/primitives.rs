//! Core byte-level types shared across the trie.

/// Output of the configured hash function. Fixed at 32 bytes: every hash
/// function this crate ships with (Keccak-256, and the test doubles in
/// `hash::tests`) produces a 32-byte digest. A hash function with a
/// different output width is out of scope (see DESIGN.md).
pub type Hash = [u8; 32];

/// Byte length of [`Hash`]. Node bodies shorter than this are inlined in
/// their parent rather than stored under their own hash (§3 invariant 7).
pub const HASH_LEN: usize = 32;

/// Reserved store key under which the current root is optionally persisted
/// when `TrieConfig::persist_root` is set. Callers must never `put`/`del`
/// this key directly; doing so raises [`crate::domain::TrieError::ReservedKey`].
pub const ROOT_DB_KEY: &[u8] = b"__trie_root__";

/// `keccak256(RLP(""))`, i.e. `keccak256(0x80)` — the root of a trie with
/// no entries, under the default Keccak-256 hash function.
///
/// Kept as a constant for the common default-hasher path; tries constructed
/// with a non-default [`crate::domain::Hasher`] compute their own empty root
/// via `hasher.hash(&rlp::encode_bytes(&[]))` instead of relying on this.
pub const KECCAK_EMPTY_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];
