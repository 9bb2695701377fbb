//! Integration tests exercising the trie end to end through its public API.

use std::sync::Arc;

use merkle_patricia_trie::adapters::InMemoryStore;
use merkle_patricia_trie::domain::{
    create_proof, create_range_proof, verify_proof, verify_range_proof, BatchOp,
    KECCAK_EMPTY_ROOT, Trie, TrieConfig,
};

fn new_trie() -> Trie<InMemoryStore> {
    Trie::with_config(InMemoryStore::new(), TrieConfig::default())
}

#[test]
fn empty_trie_root_matches_well_known_constant() {
    assert_eq!(new_trie().root(), KECCAK_EMPTY_ROOT);
}

#[test]
fn single_entry_then_removal_returns_to_empty_root() {
    let trie = new_trie();
    trie.put(b"key", b"value".to_vec()).unwrap();
    assert_ne!(trie.root(), KECCAK_EMPTY_ROOT);
    trie.del(b"key").unwrap();
    assert_eq!(trie.root(), KECCAK_EMPTY_ROOT);
}

#[test]
fn root_is_order_independent_across_many_insertions() {
    let pairs: Vec<(String, String)> = (0..64)
        .map(|i| (format!("key-{i:03}"), format!("value-{i}")))
        .collect();

    let forward = new_trie();
    for (k, v) in &pairs {
        forward.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
    }

    let backward = new_trie();
    for (k, v) in pairs.iter().rev() {
        backward.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
    }

    assert_eq!(forward.root(), backward.root());
}

#[test]
fn deletions_in_any_order_converge_to_the_same_root() {
    let pairs: Vec<(String, String)> = (0..32)
        .map(|i| (format!("k{i}"), format!("v{i}")))
        .collect();

    let a = new_trie();
    let b = new_trie();
    for (k, v) in &pairs {
        a.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
        b.put(k.as_bytes(), v.as_bytes().to_vec()).unwrap();
    }
    assert_eq!(a.root(), b.root());

    for (k, _) in pairs.iter().step_by(2) {
        a.del(k.as_bytes()).unwrap();
    }
    for (k, _) in pairs.iter().step_by(2).rev() {
        b.del(k.as_bytes()).unwrap();
    }
    assert_eq!(a.root(), b.root());
}

#[test]
fn overwriting_a_key_does_not_change_entry_count() {
    let trie = new_trie();
    trie.put(b"a", b"1".to_vec()).unwrap();
    let root_after_first = trie.root();
    trie.put(b"a", b"1".to_vec()).unwrap();
    assert_eq!(trie.root(), root_after_first);
}

#[test]
fn point_proof_round_trips_for_every_inserted_key() {
    let trie = new_trie();
    let keys = ["alpha", "alphabet", "bravo", "bravado", "charlie"];
    for (i, k) in keys.iter().enumerate() {
        trie.put(k.as_bytes(), vec![i as u8]).unwrap();
    }

    for (i, k) in keys.iter().enumerate() {
        let proof = create_proof(&trie, k.as_bytes()).unwrap();
        let value = verify_proof(trie.root(), k.as_bytes(), &proof, trie.config().clone()).unwrap();
        assert_eq!(value, Some(vec![i as u8]));
    }
}

#[test]
fn point_proof_authenticates_exclusion_for_absent_key() {
    let trie = new_trie();
    trie.put(b"alpha", b"1".to_vec()).unwrap();
    trie.put(b"bravo", b"2".to_vec()).unwrap();

    let proof = create_proof(&trie, b"charlie").unwrap();
    let value = verify_proof(trie.root(), b"charlie", &proof, trie.config().clone()).unwrap();
    assert_eq!(value, None);
}

#[test]
fn range_proof_covers_all_entries_between_bounds() {
    let trie = new_trie();
    for i in 0u8..20 {
        trie.put(&[i], vec![i]).unwrap();
    }

    let (entries, proof) = create_range_proof(&trie, &[3], &[12]).unwrap();
    assert_eq!(entries.len(), 10);

    let keys: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.clone()).collect();
    let values: Vec<Vec<u8>> = entries.iter().map(|(_, v)| v.clone()).collect();
    verify_range_proof(trie.root(), &[3], &[12], &keys, &values, &proof, trie.config().clone())
        .unwrap();
}

#[test]
fn range_proof_verification_fails_if_an_entry_is_dropped() {
    let trie = new_trie();
    for i in 0u8..20 {
        trie.put(&[i], vec![i]).unwrap();
    }

    let (entries, proof) = create_range_proof(&trie, &[3], &[12]).unwrap();
    let mut keys: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.clone()).collect();
    let mut values: Vec<Vec<u8>> = entries.iter().map(|(_, v)| v.clone()).collect();
    keys.remove(3);
    values.remove(3);

    let result =
        verify_range_proof(trie.root(), &[3], &[12], &keys, &values, &proof, trie.config().clone());
    assert!(result.is_err());
}

#[test]
fn iteration_visits_every_key_in_ascending_order() {
    let trie = new_trie();
    let keys = ["zeta", "alpha", "mu", "alphabet"];
    for k in keys {
        trie.put(k.as_bytes(), b"v".to_vec()).unwrap();
    }

    let collected: Vec<Vec<u8>> = trie.iter().unwrap().map(|r| r.unwrap().0).collect();
    let mut expected: Vec<Vec<u8>> = keys.iter().map(|s| s.as_bytes().to_vec()).collect();
    expected.sort();

    assert_eq!(collected, expected);
}

#[test]
fn batch_applies_puts_and_deletes_as_one_unit() {
    let trie = new_trie();
    trie.put(b"a", b"1".to_vec()).unwrap();
    trie.put(b"b", b"2".to_vec()).unwrap();

    trie.batch(vec![
        BatchOp::Delete(b"a".to_vec()),
        BatchOp::Put(b"c".to_vec(), b"3".to_vec()),
    ])
    .unwrap();

    assert_eq!(trie.get(b"a").unwrap(), None);
    assert_eq!(trie.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(trie.get(b"c").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn secure_trie_mode_hashes_keys_before_routing() {
    let config = TrieConfig { hash_keys: true, ..TrieConfig::default() };
    let trie = Trie::with_config(InMemoryStore::new(), config);
    trie.put(b"alice", b"100".to_vec()).unwrap();
    assert_eq!(trie.get(b"alice").unwrap(), Some(b"100".to_vec()));
    assert_eq!(trie.get(b"bob").unwrap(), None);
}

#[test]
fn reopening_a_trie_with_persisted_root_preserves_contents() {
    let config = TrieConfig { persist_root: true, ..TrieConfig::default() };
    let store = InMemoryStore::new();

    {
        let trie = Trie::with_config(store.clone(), config.clone());
        for i in 0u8..10 {
            trie.put(&[i], vec![i * 2]).unwrap();
        }
    }

    let reopened = Trie::open(store, config).unwrap();
    for i in 0u8..10 {
        assert_eq!(reopened.get(&[i]).unwrap(), Some(vec![i * 2]));
    }
}

#[test]
fn randomized_insert_delete_settles_on_consistent_root() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    tracing_subscriber::fmt::init();

    let mut rng = StdRng::seed_from_u64(7);
    let trie = new_trie();
    let mut model: std::collections::BTreeMap<Vec<u8>, Vec<u8>> = std::collections::BTreeMap::new();

    for _ in 0..500 {
        let key = vec![rng.gen_range(0..16) as u8, rng.gen_range(0..16) as u8];
        if rng.gen_bool(0.7) {
            let value = vec![rng.gen::<u8>(), rng.gen::<u8>()];
            trie.put(&key, value.clone()).unwrap();
            model.insert(key, value);
        } else {
            trie.del(&key).unwrap();
            model.remove(&key);
        }
    }

    for (key, value) in &model {
        assert_eq!(trie.get(key).unwrap(), Some(value.clone()));
    }

    let iterated: std::collections::BTreeMap<Vec<u8>, Vec<u8>> =
        trie.iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(iterated, model);

    if model.is_empty() {
        assert_eq!(trie.root(), KECCAK_EMPTY_ROOT);
    }
}

#[test]
fn copy_produces_an_independently_mutable_snapshot() {
    let trie = new_trie();
    trie.put(b"a", b"1".to_vec()).unwrap();
    let snapshot = trie.copy();

    trie.put(b"b", b"2".to_vec()).unwrap();
    trie.del(b"a").unwrap();

    assert_eq!(snapshot.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(snapshot.get(b"b").unwrap(), None);
}

#[test]
fn custom_hasher_changes_the_root_but_not_correctness() {
    use merkle_patricia_trie::domain::Hasher;

    #[derive(Default)]
    struct SumHasher;
    impl Hasher for SumHasher {
        fn hash(&self, data: &[u8]) -> [u8; 32] {
            let mut out = [0u8; 32];
            let sum: u64 = data.iter().map(|&b| b as u64).sum();
            out[24..].copy_from_slice(&sum.to_be_bytes());
            out
        }
    }

    let config = TrieConfig::with_hasher(Arc::new(SumHasher));
    let trie = Trie::with_config(InMemoryStore::new(), config);
    trie.put(b"dog", b"puppy".to_vec()).unwrap();
    assert_eq!(trie.get(b"dog").unwrap(), Some(b"puppy".to_vec()));
}
