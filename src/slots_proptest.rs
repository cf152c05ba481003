#![cfg(test)]

// Property tests for Slots kept inside the crate so they can reach the
// unexported structural layer.

use crate::slots::{Handle, Slots};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    // Index into the handles issued so far; stale ones included.
    Remove(usize),
    Get(usize),
    // Raw id that may or may not be live.
    Probe(u32),
    Grow,
}

fn arb_ops() -> impl Strategy<Value = (usize, Vec<Op>)> {
    let op = prop_oneof![
        4 => any::<i32>().prop_map(Op::Insert),
        2 => any::<usize>().prop_map(Op::Remove),
        2 => any::<usize>().prop_map(Op::Get),
        1 => (0u32..256).prop_map(Op::Probe),
        1 => Just(Op::Grow),
    ];
    (0usize..=64, proptest::collection::vec(op, 1..200))
}

// Property: State-machine equivalence against a HashMap keyed by handle.
// Invariants checked after every step:
// - Issued handles are nonzero and never collide with a live handle.
// - Live handles resolve to their payload; removed ones never resolve.
// - `len` matches the model; `iter` yields exactly the live set.
// - Capacity is a power of two that never shrinks, and after an insert the
//   load stays below 3/4 of it.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_slots_state_machine((initial, ops) in arb_ops()) {
        let mut sut: Slots<i32> = Slots::try_with_capacity(initial).unwrap();
        let mut model: HashMap<Handle, i32> = HashMap::new();
        let mut issued: Vec<Handle> = Vec::new();
        let mut capacity = sut.capacity();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let h = sut.insert(v).unwrap();
                    prop_assert!(h.is_valid());
                    prop_assert!(!model.contains_key(&h), "issued a live handle twice");
                    model.insert(h, v);
                    issued.push(h);
                    prop_assert!(sut.len() * 4 < sut.capacity() * 3);
                }
                Op::Remove(i) => {
                    if issued.is_empty() { continue; }
                    let h = issued[i % issued.len()];
                    prop_assert_eq!(sut.remove(h), model.remove(&h));
                }
                Op::Get(i) => {
                    if issued.is_empty() { continue; }
                    let h = issued[i % issued.len()];
                    prop_assert_eq!(sut.get(h).map(|e| *e.payload()), model.get(&h).copied());
                }
                Op::Probe(raw) => {
                    let h = Handle::from_raw(raw);
                    prop_assert_eq!(sut.get(h).is_some(), model.contains_key(&h));
                }
                Op::Grow => {
                    // Bounded so long runs stay cheap.
                    if sut.capacity() < 4096 {
                        sut.grow().unwrap();
                    }
                }
            }

            prop_assert!(sut.capacity().is_power_of_two());
            prop_assert!(sut.capacity() >= capacity);
            capacity = sut.capacity();
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            let seen: BTreeSet<Handle> = sut.iter().map(|e| e.handle()).collect();
            let expected: BTreeSet<Handle> = model.keys().copied().collect();
            prop_assert_eq!(seen, expected);
        }

        let mut rest = sut.into_live();
        rest.sort();
        let mut expected: Vec<(Handle, i32)> = model.into_iter().collect();
        expected.sort();
        prop_assert_eq!(rest, expected);
    }
}
