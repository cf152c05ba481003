// HandleMap property test.
//
// Model: per handle, the payload and the number of outstanding references
// (1 after insert, +1 per successful grab, -1 per release).
// Invariants after every step:
// - grab succeeds iff the model has the handle, and returns its payload.
// - release returns the payload iff it drops the model count to zero;
//   afterwards the handle is gone from both.
// - len() and handles() match the model's live set; list() reports the
//   true total.
// - capacity is a power of two, never shrinks, and the load stays below
//   3/4 of it.
use proptest::prelude::*;
use rc_handlemap::{Handle, HandleMap};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
enum Op {
    Insert(u16),
    Grab(usize),
    Release(usize),
    List(usize),
    Bogus(u32),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => any::<u16>().prop_map(Op::Insert),
        3 => any::<usize>().prop_map(Op::Grab),
        4 => any::<usize>().prop_map(Op::Release),
        1 => (0usize..8).prop_map(Op::List),
        1 => any::<u32>().prop_map(Op::Bogus),
    ];
    proptest::collection::vec(op, 1..200)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_refcount_lifecycle(ops in arb_ops()) {
        let m: HandleMap<u16> = HandleMap::new();
        let mut model: HashMap<Handle, (u16, usize)> = HashMap::new();
        let mut issued: Vec<Handle> = Vec::new();
        let mut capacity = m.capacity();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let h = m.insert(v).unwrap();
                    prop_assert!(h.is_valid());
                    prop_assert!(model.insert(h, (v, 1)).is_none(), "live handle reissued");
                    issued.push(h);
                }
                Op::Grab(i) => {
                    if issued.is_empty() { continue; }
                    let h = issued[i % issued.len()];
                    let got = m.grab(h);
                    match model.get_mut(&h) {
                        Some((v, refs)) => {
                            prop_assert_eq!(got, Some(*v));
                            *refs += 1;
                        }
                        None => prop_assert_eq!(got, None),
                    }
                }
                Op::Release(i) => {
                    if issued.is_empty() { continue; }
                    let h = issued[i % issued.len()];
                    let got = m.release(h);
                    match model.get_mut(&h) {
                        Some((v, refs)) => {
                            *refs -= 1;
                            if *refs == 0 {
                                prop_assert_eq!(got, Some(*v));
                                model.remove(&h);
                            } else {
                                prop_assert_eq!(got, None);
                            }
                        }
                        None => prop_assert_eq!(got, None),
                    }
                }
                Op::List(n) => {
                    let mut buf = vec![Handle::INVALID; n];
                    let total = m.list(&mut buf);
                    prop_assert_eq!(total, model.len());
                    for h in buf.iter().take(total.min(n)) {
                        prop_assert!(model.contains_key(h));
                    }
                }
                Op::Bogus(raw) => {
                    let h = Handle::from_raw(raw);
                    if !model.contains_key(&h) {
                        prop_assert_eq!(m.grab(h), None);
                        prop_assert_eq!(m.release(h), None);
                    }
                }
            }

            prop_assert_eq!(m.len(), model.len());
            let live: BTreeSet<Handle> = m.handles().into_iter().collect();
            let expected: BTreeSet<Handle> = model.keys().copied().collect();
            prop_assert_eq!(live, expected);
            prop_assert!(m.capacity().is_power_of_two());
            prop_assert!(m.capacity() >= capacity);
            capacity = m.capacity();
            prop_assert!(m.len() * 4 < m.capacity() * 3);
        }
    }
}
