use super::*;

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

fn validate_node<T>(nd: &Node<T>) -> usize {
    let below = match &nd.nodes {
        Some(nodes) => {
            let below: usize = nodes.iter().map(validate_node).sum();
            assert_eq!(nd.size, below, "stored subtree size must match entries");
            assert_ne!(below, 0, "empty node array must be freed");
            below
        }
        None => {
            assert_eq!(nd.size, 0, "size without a node array");
            0
        }
    };
    nd.value.is_some() as usize + below
}

fn validate_map<T>(map: &IMap<T>) {
    let total: usize = map.nodes.iter().map(validate_node).sum();
    assert_eq!(total, map.len, "reachable entries must match IMap::len");
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, u64),
    Remove(u64),
    Get(u64),
}

fn key_strategy() -> impl Strategy<Value = u64> + Clone {
    // mostly small ids that collide on low digits, some from the full range
    prop_oneof![
        4 => 0u64..64,
        4 => 0u64..100_000,
        2 => any::<u64>(),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        30 => key.clone().prop_map(Op::Remove),
        20 => key.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=1000)
}

fn shared_map(pool: &[Rc<u64>], keys: &BTreeSet<u64>) -> IMap<Rc<u64>> {
    let mut map = IMap::new();
    for &key in keys {
        map.insert(key, pool[key as usize].clone()).unwrap();
    }
    map
}

fn key_set() -> impl Strategy<Value = BTreeSet<u64>> {
    prop::collection::btree_set(0u64..4096, 0..400)
}

#[derive(Clone, Copy, Debug)]
enum Algebra {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: IMap<u64> = IMap::new();
        let mut m: BTreeMap<u64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = match t.insert(key, value) {
                        Ok(Insert::Inserted) => None,
                        Ok(Insert::Overwritten(old)) => Some(old),
                        Err(e) => panic!("insert failed: {e}"),
                    };
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.pop(key), m.remove(&key));
                    prop_assert_eq!(t.get(key), None);
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(key), m.get(&key));
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_map(&t);

        let mut got: Vec<(u64, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        got.sort_unstable();
        let expected: Vec<(u64, u64)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, expected);

        let mut exported: Vec<u64> = t.to_vec().unwrap().into_iter().copied().collect();
        let walked: Vec<u64> = {
            let mut out = Vec::new();
            t.walk(|v| { out.push(*v); 0 });
            out
        };
        prop_assert_eq!(&walked, &t.values().copied().collect::<Vec<_>>());
        exported.sort_unstable();
        let mut values: Vec<u64> = m.values().copied().collect();
        values.sort_unstable();
        prop_assert_eq!(exported, values);

        let keys: Vec<u64> = m.keys().copied().collect();
        for key in keys {
            t.pop(key);
        }
        prop_assert!(t.is_empty());
        prop_assert!(t.nodes.iter().all(|nd| nd.nodes.is_none() && nd.size == 0));
    }

    #[test]
    fn prop_walkn_is_prefix_of_walk(keys in prop::collection::btree_set(key_strategy(), 0..300), budget in 0usize..400) {
        let mut t = IMap::new();
        for &key in &keys {
            t.insert(key, key).unwrap();
        }

        let mut left = budget;
        let mut seen = Vec::new();
        t.walkn(&mut left, |v| { seen.push(*v); 1 });

        let expected: Vec<u64> = t.values().copied().take(budget).collect();
        prop_assert_eq!(left, budget - expected.len());
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_set_algebra(
        a in key_set(),
        b in key_set(),
        op in prop_oneof![
            Just(Algebra::Union),
            Just(Algebra::Intersection),
            Just(Algebra::Difference),
            Just(Algebra::SymmetricDifference),
        ],
    ) {
        let pool: Vec<Rc<u64>> = (0..4096).map(Rc::new).collect();
        let mut dest = shared_map(&pool, &a);
        let src = shared_map(&pool, &b);

        let expected: BTreeSet<u64> = match op {
            Algebra::Union => {
                dest.union_ref(src).unwrap();
                a.union(&b).copied().collect()
            }
            Algebra::Intersection => {
                dest.intersection_ref(src).unwrap();
                a.intersection(&b).copied().collect()
            }
            Algebra::Difference => {
                dest.difference_ref(src).unwrap();
                a.difference(&b).copied().collect()
            }
            Algebra::SymmetricDifference => {
                dest.symmetric_difference_ref(src).unwrap();
                a.symmetric_difference(&b).copied().collect()
            }
        };

        validate_map(&dest);
        prop_assert_eq!(dest.len(), expected.len());
        prop_assert_eq!(dest.keys().collect::<BTreeSet<_>>(), expected.clone());

        // every handle not held by `dest` was released
        for (key, obj) in pool.iter().enumerate() {
            let held = expected.contains(&(key as u64)) as usize;
            prop_assert_eq!(Rc::strong_count(obj), 1 + held);
            if held == 1 {
                prop_assert!(Rc::ptr_eq(dest.get(key as u64).unwrap(), obj));
            }
        }
    }
}

#[test]
fn exhaustive_boundary_keys() {
    // every key sharing a low digit with its neighbours at several depths
    let keys: Vec<u64> = (0..4)
        .flat_map(|level| {
            let base = 32u64.pow(level);
            [base.wrapping_sub(1), base, base + 31, base + 32, base * 33]
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut t = IMap::new();
    for &key in &keys {
        assert_eq!(t.insert(key, key), Ok(Insert::Inserted));
        validate_map(&t);
    }
    for &key in &keys {
        assert_eq!(t.get(key), Some(&key));
    }
    for &key in keys.iter().rev() {
        assert_eq!(t.pop(key), Some(key));
        validate_map(&t);
    }
    assert!(t.nodes.iter().all(|nd| nd.nodes.is_none()));
}
