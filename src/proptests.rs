use super::*;

use crate::node::NodeId;
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Structural checks beyond `validate()`: every reachable node is live, and
/// stored balances match a height walk.
fn validate_tree<V>(t: &AvlTree<V>) {
    let report = t.validate();
    assert!(report.is_ok(), "{report}");

    let mut stack: Vec<NodeId> = Vec::new();
    if !t.root.is_null() {
        stack.push(t.root);
    }
    let mut reachable = 0usize;
    while let Some(id) = stack.pop() {
        let node = &t.nodes[id];
        assert!(node.value.is_some(), "reachable node {} has no value", node.key);
        assert!((-1..=1).contains(&node.balance));
        reachable += 1;
        for child in [node.left, node.right] {
            if !child.is_null() {
                assert_eq!(t.nodes[child].parent, id);
                stack.push(child);
            }
        }
    }
    assert_eq!(reachable, t.len(), "reachable node count must match len");
    assert_eq!(t.nodes.live(), t.len(), "arena live count must match len");

    let got: Vec<u32> = t.keys().collect();
    assert!(got.windows(2).all(|w| w[0] < w[1]), "keys not strictly increasing");
}

/// Standard AVL height bound, in levels.
fn height_bound(n: usize) -> f64 {
    1.4405 * ((n + 2) as f64).log2() - 0.3277
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "0u32..512")] u32, u64),
    #[proptest(weight = 3)]
    Delete(#[proptest(strategy = "0u32..512")] u32),
    #[proptest(weight = 2)]
    Search(#[proptest(strategy = "0u32..512")] u32),
}

fn unique_keys(max_len: usize) -> impl Strategy<Value = Vec<u32>> {
    prop::collection::btree_set(any::<u32>(), 0..=max_len)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_u64(ops in prop::collection::vec(any::<Op>(), 0..=2000)) {
        let mut t: AvlTree<u64> = AvlTree::new();
        let mut m: BTreeMap<u32, u64> = BTreeMap::new();

        for op in ops {
            match op {
                // Duplicate inserts and missing deletes are contract
                // violations, so the model decides which calls are legal.
                Op::Insert(key, value) => {
                    if let std::collections::btree_map::Entry::Vacant(e) = m.entry(key) {
                        e.insert(value);
                        t.insert(key, value);
                    }
                }
                Op::Delete(key) => {
                    if let Some(expected) = m.remove(&key) {
                        prop_assert_eq!(t.delete(key), expected);
                        prop_assert_eq!(t.search(key), None);
                    }
                }
                Op::Search(key) => {
                    prop_assert_eq!(t.search(key), m.get(&key));
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(u32, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(u32, u64)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_every_insert_keeps_invariants(keys in unique_keys(300)) {
        let mut t: AvlTree<u32> = AvlTree::new();
        for (i, &key) in keys.iter().enumerate() {
            t.insert(key, key ^ 0xdead_beef);
            prop_assert_eq!(t.len(), i + 1);
            prop_assert!(t.validate().is_ok(), "{}", t.validate());
        }
        prop_assert!((t.height() as f64) <= height_bound(keys.len()));
    }

    #[test]
    fn prop_delete_one_keeps_rest(keys in unique_keys(200), pick in any::<prop::sample::Index>()) {
        prop_assume!(!keys.is_empty());
        let mut t: AvlTree<u32> = AvlTree::new();
        for &key in &keys {
            t.insert(key, key.wrapping_mul(3));
        }
        let victim = keys[pick.index(keys.len())];

        prop_assert_eq!(t.delete(victim), victim.wrapping_mul(3));
        prop_assert_eq!(t.len(), keys.len() - 1);
        prop_assert_eq!(t.search(victim), None);
        for &key in keys.iter().filter(|&&k| k != victim) {
            let expected = key.wrapping_mul(3);
            prop_assert_eq!(t.search(key), Some(&expected));
        }
        validate_tree(&t);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u32> = vec![1, 2, 3, 4, 5, 6, 7];

    for_each_permutation(&keys, |perm| {
        let mut t: AvlTree<u32> = AvlTree::new();
        for k in &perm {
            t.insert(*k, k * 10);
            validate_tree(&t);
        }
        let got: Vec<(u32, u32)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(u32, u32)> = keys.iter().map(|&k| (k, k * 10)).collect();
        assert_eq!(got, expected, "insert order {perm:?}");
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    let keys: Vec<u32> = vec![10, 20, 5, 6, 15, 30, 1];

    // Insert in a fixed order, then delete in all permutations.
    let base: AvlTree<u32> = keys.iter().map(|&k| (k, k)).collect();
    validate_tree(&base);

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        let mut m: BTreeMap<u32, u32> = keys.iter().map(|&k| (k, k)).collect();

        for k in perm {
            assert_eq!(t.delete(k), k);
            m.remove(&k);
            assert_eq!(t.len(), m.len());
            validate_tree(&t);
            for (&key, value) in &m {
                assert_eq!(t.search(key), Some(value));
            }
        }
        assert_eq!(t.len(), 0);
        assert!(t.root.is_null());
        assert_eq!(t.height(), 0);
    });
}

#[test]
fn height_bound_random_keys() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(1);
    for n in [1usize, 2, 10, 100, 1000, 4000] {
        let mut keys: Vec<u32> = (0..n as u32).map(|k| k * 7 + 3).collect();
        keys.shuffle(&mut rng);
        let t: AvlTree<()> = keys.iter().map(|&k| (k, ())).collect();
        assert_eq!(t.len(), n);
        assert!(
            (t.height() as f64) <= height_bound(n),
            "n={n} height={} bound={}",
            t.height(),
            height_bound(n)
        );
        validate_tree(&t);
    }
}
