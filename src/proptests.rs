use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Order the byte indexes iterate in: by length, then bytes.
fn canonical_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn canonical(keys: impl IntoIterator<Item = Vec<u8>>) -> Vec<Vec<u8>> {
    let mut out: Vec<_> = keys.into_iter().collect();
    out.sort_by(|a, b| canonical_cmp(a, b));
    out
}

/// Small alphabet so that lookups hit stored keys often.
fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    prop_oneof![
        4 => prop::collection::vec(prop::sample::select(vec![0u8, 1, b'a', b'b', 0xFF]), 1..=12),
        1 => prop::collection::vec(any::<u8>(), 1..=64),
    ]
}

/// Like [`key_strategy`], but sometimes longer than the 64-byte limit.
fn any_len_key() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        9 => key_strategy(),
        1 => prop::collection::vec(any::<u8>(), 65..=80),
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 3)]
    Add(#[proptest(strategy = "any_len_key()")] Vec<u8>),
    #[proptest(weight = 2)]
    Find(#[proptest(strategy = "any_len_key()")] Vec<u8>),
    AddAtFound(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    Walk,
}

fn expected_rank(model: &BTreeSet<Vec<u8>>, key: &[u8]) -> usize {
    model
        .iter()
        .filter(|k| canonical_cmp(k, key) == Ordering::Less)
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_pack_roundtrip(key in prop::collection::vec(any::<u8>(), 1..=64)) {
        let packed = pack::pack(&key).unwrap();
        prop_assert_eq!(packed.words().len(), key.len().div_ceil(8));
        prop_assert_eq!(packed.slot(), key.len() - 1);
        prop_assert_eq!(packed.unpack(), key);
    }

    #[test]
    fn prop_pack_preserves_order(
        (a, b) in (1usize..=64).prop_flat_map(|n| (
            prop::collection::vec(any::<u8>(), n),
            prop::collection::vec(any::<u8>(), n),
        ))
    ) {
        let pa = pack::pack(&a).unwrap();
        let pb = pack::pack(&b).unwrap();
        prop_assert_eq!(a.cmp(&b), pa.words().cmp(pb.words()));
    }

    #[test]
    fn prop_key_bytes_matches_model(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        let mut t = KeyBytes::new();
        let mut m: BTreeSet<Vec<u8>> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(key) => {
                    if key.len() > MAX_KEY_LEN {
                        let is_invalid = matches!(t.add(&key), Err(IndexError::InvalidKey { .. }));
                        prop_assert!(is_invalid);
                    } else {
                        let rank = expected_rank(&m, &key);
                        let existed = m.contains(&key);
                        prop_assert_eq!(t.add(&key).unwrap(), (rank, existed));
                        m.insert(key);
                    }
                }
                Op::Find(key) => {
                    let expected = if key.len() > MAX_KEY_LEN {
                        (m.len(), false)
                    } else {
                        (expected_rank(&m, &key), m.contains(&key))
                    };
                    prop_assert_eq!(t.find(&key), expected);
                }
                Op::AddAtFound(key) => {
                    let (rank, found) = t.find(&key);
                    if !found {
                        t.add_at(&key, rank).unwrap();
                        m.insert(key);
                    }
                }
                Op::Walk => {
                    t.reset();
                    let mut seen = Vec::new();
                    while let Some((key, last)) = t.next_key() {
                        seen.push(key);
                        if last {
                            break;
                        }
                    }
                    prop_assert_eq!(seen, canonical(m.iter().cloned()));
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        prop_assert_eq!(t.keys(), canonical(m.iter().cloned()));
    }

    #[test]
    fn prop_bulk_build_is_order_independent(
        keys in prop::collection::btree_set(key_strategy(), 0..=200)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let mut sorted = KeyBytes::new();
        let mut bulk = KeyBytes::new();
        for k in &keys {
            sorted.add(k).unwrap();
            bulk.add_unsorted(k).unwrap();
        }
        let remap = bulk.build().unwrap();

        let ranked = bulk.keys();
        prop_assert_eq!(&ranked, &sorted.keys());
        prop_assert_eq!(remap.len(), keys.len());
        for (rank, &i) in remap.iter().enumerate() {
            prop_assert_eq!(&keys[i], &ranked[rank]);
            prop_assert_eq!(bulk.find(&keys[i]), (rank, true));
        }
        prop_assert_eq!(sorted.to_bytes().unwrap(), bulk.to_bytes().unwrap());
    }

    #[test]
    fn prop_counter_sums(
        pairs in prop::collection::vec((key_strategy(), -1000i64..1000), 0..=400)
    ) {
        let mut c = CounterBytes::new();
        let mut m: BTreeMap<Vec<u8>, i64> = BTreeMap::new();
        for (k, v) in &pairs {
            c.add(k, *v).unwrap();
            *m.entry(k.clone()).or_default() += v;
        }
        c.build();

        prop_assert_eq!(c.len(), m.len());
        for (k, v) in &m {
            prop_assert_eq!(c.find(k), Some(*v));
        }
        let mut expected: Vec<(Vec<u8>, i64)> = m.into_iter().collect();
        expected.sort_by(|a, b| canonical_cmp(&a.0, &b.0));
        prop_assert_eq!(c.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn prop_keyval_matches_model(
        pairs in prop::collection::vec((key_strategy(), any::<i64>()), 0..=300)
    ) {
        let mut t = KeyValBytes::new();
        let mut m: BTreeMap<Vec<u8>, i64> = BTreeMap::new();
        for (k, v) in pairs {
            prop_assert_eq!(t.add(&k, v).unwrap(), m.insert(k, v).is_some());
        }
        prop_assert_eq!(t.len(), m.len());
        for (k, v) in &m {
            prop_assert_eq!(t.find(k), Some(*v));
        }
    }

    #[test]
    fn prop_persist_roundtrip(keys in prop::collection::btree_set(key_strategy(), 0..=200)) {
        let config = Config { verify_on_read: true, ..Config::default() };

        let mut t = KeyBytes::new();
        let mut kv = KeyValBytes::new();
        for (i, k) in keys.iter().enumerate() {
            t.add(k).unwrap();
            kv.add(k, i as i64 - 100).unwrap();
        }

        let back = KeyBytes::from_bytes_with(&t.to_bytes().unwrap(), &config).unwrap();
        prop_assert_eq!(back.len(), t.len());
        prop_assert_eq!(back.keys(), t.keys());
        for k in &keys {
            prop_assert_eq!(back.find(k), t.find(k));
        }

        let back = KeyValBytes::from_bytes_with(&kv.to_bytes().unwrap(), &config).unwrap();
        prop_assert_eq!(back.iter().collect::<Vec<_>>(), kv.iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_int_keys_match_model(keys in prop::collection::vec(any::<u32>(), 0..=300)) {
        let mut t = KeyUint32::new();
        let mut m: BTreeSet<u32> = BTreeSet::new();
        for &k in &keys {
            let rank = m.range(..k).count();
            prop_assert_eq!(t.add(k), (rank, m.contains(&k)));
            m.insert(k);
        }
        prop_assert_eq!(t.keys(), m.into_iter().collect::<Vec<_>>());
    }
}

/// Calls `f` with every ordering of `items`, stepping index permutations in
/// lexicographic order.
fn visit_orderings<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    let mut idx: Vec<usize> = (0..items.len()).collect();
    loop {
        f(idx.iter().map(|&i| items[i].clone()).collect());
        let Some(pivot) = (1..idx.len()).rev().find(|&i| idx[i - 1] < idx[i]) else {
            return;
        };
        let swap = (pivot..idx.len()).rev().find(|&j| idx[j] > idx[pivot - 1]).unwrap_or(pivot);
        idx.swap(pivot - 1, swap);
        idx[pivot..].reverse();
    }
}

#[test]
fn exhaustive_bulk_order_small_set() {
    let keys: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
        vec![b'x'; 9],
    ];
    let expected = canonical(keys.iter().cloned());

    let mut seen = 0usize;
    visit_orderings(&keys, |perm| {
        seen += 1;
        let mut t = KeyBytes::new();
        for k in &perm {
            t.add_unsorted(k).unwrap();
        }
        let remap = t.build().unwrap();
        assert_eq!(t.keys(), expected);
        let reordered = apply_remap(&remap, &perm);
        assert_eq!(reordered, expected);
    });
    assert_eq!(seen, 720);
}
