//! Model-Based Tests
//!
//! Random operation sequences checked against a `BTreeMap` reference model,
//! in singleton mode and as transactional batches.

use proptest::prelude::*;
use std::collections::BTreeMap;
use txlist::{OrderedList, TxSession};

#[derive(Debug, Clone)]
enum Op {
    Put(i64, i64),
    PutIfAbsent(i64, i64),
    Remove(i64),
    Get(i64),
    Contains(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // a narrow key space forces overwrites, re-inserts, and removals of
    // present keys
    let key = 0i64..16;
    let val = 0i64..1000;
    prop_oneof![
        (key.clone(), val.clone()).prop_map(|(k, v)| Op::Put(k, v)),
        (key.clone(), val).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        key.clone().prop_map(Op::Remove),
        key.clone().prop_map(Op::Get),
        key.prop_map(Op::Contains),
    ]
}

/// Apply one operation to the model, returning what the list should return.
fn apply_model(model: &mut BTreeMap<i64, i64>, op: &Op) -> (Option<i64>, bool) {
    match op {
        Op::Put(k, v) => (model.insert(*k, *v), false),
        Op::PutIfAbsent(k, v) => {
            if let Some(existing) = model.get(k) {
                (Some(*existing), false)
            } else {
                model.insert(*k, *v);
                (None, false)
            }
        }
        Op::Remove(k) => (model.remove(k), false),
        Op::Get(k) => (model.get(k).copied(), false),
        Op::Contains(k) => (None, model.contains_key(k)),
    }
}

fn scan(list: &OrderedList<i64, i64>) -> Vec<i64> {
    let mut session = TxSession::new();
    let mut iter = list.iter(&session, false);
    iter.init(&mut session).unwrap();
    let mut out = Vec::new();
    while iter.has_next(&mut session).unwrap() {
        out.push(iter.next(&mut session).unwrap());
    }
    out
}

proptest! {
    #[test]
    fn singleton_operations_match_the_model(
        ops in proptest::collection::vec(op_strategy(), 1..200),
    ) {
        let list: OrderedList<i64, i64> = OrderedList::new();
        let mut session = TxSession::new();
        let mut model = BTreeMap::new();

        for op in &ops {
            let (expect_val, expect_bool) = apply_model(&mut model, op);
            match op {
                Op::Put(k, v) => {
                    prop_assert_eq!(list.put(&mut session, *k, *v).unwrap(), expect_val);
                }
                Op::PutIfAbsent(k, v) => {
                    prop_assert_eq!(
                        list.put_if_absent(&mut session, *k, *v).unwrap(),
                        expect_val
                    );
                }
                Op::Remove(k) => {
                    prop_assert_eq!(list.remove(&mut session, k).unwrap(), expect_val);
                }
                Op::Get(k) => {
                    prop_assert_eq!(list.get(&mut session, k).unwrap(), expect_val);
                }
                Op::Contains(k) => {
                    prop_assert_eq!(
                        list.contains_key(&mut session, k).unwrap(),
                        expect_bool
                    );
                }
            }
        }

        let expected: Vec<i64> = model.values().copied().collect();
        prop_assert_eq!(scan(&list), expected);
        prop_assert_eq!(list.size(&mut session).unwrap(), model.len());
    }

    #[test]
    fn transactional_batches_match_the_model(
        batches in proptest::collection::vec(
            proptest::collection::vec(op_strategy(), 1..10),
            1..30,
        ),
    ) {
        let list: OrderedList<i64, i64> = OrderedList::new();
        let mut session = TxSession::new();
        let runner = list.runner();
        let mut model = BTreeMap::new();

        for batch in &batches {
            // replay the batch against a scratch model inside the attempt so
            // a retried attempt starts from the committed state
            let committed = runner
                .run(&mut session, |list, session| {
                    let mut scratch = model.clone();
                    for op in batch {
                        let (expect_val, expect_bool) = apply_model(&mut scratch, op);
                        match op {
                            Op::Put(k, v) => {
                                assert_eq!(list.put(session, *k, *v)?, expect_val);
                            }
                            Op::PutIfAbsent(k, v) => {
                                assert_eq!(
                                    list.put_if_absent(session, *k, *v)?,
                                    expect_val
                                );
                            }
                            Op::Remove(k) => {
                                assert_eq!(list.remove(session, k)?, expect_val);
                            }
                            Op::Get(k) => {
                                assert_eq!(list.get(session, k)?, expect_val);
                            }
                            Op::Contains(k) => {
                                assert_eq!(list.contains_key(session, k)?, expect_bool);
                            }
                        }
                    }
                    Ok(scratch)
                })
                .unwrap();
            model = committed;
        }

        let expected: Vec<i64> = model.values().copied().collect();
        prop_assert_eq!(scan(&list), expected);
    }
}
