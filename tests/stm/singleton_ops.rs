//! Singleton Operation Tests
//!
//! Operations outside a transaction execute immediately, never abort, and
//! keep the list sorted under concurrent access.

use crate::support::{scan_values, seeded};
use std::sync::{Arc, Barrier};
use std::thread;
use txlist::{OrderedList, TxSession};

// ============================================================================
// Sequential semantics
// ============================================================================

#[test]
fn put_returns_previous_value() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    let mut session = TxSession::new();

    assert_eq!(list.put(&mut session, 1, 10).unwrap(), None);
    assert_eq!(list.put(&mut session, 1, 11).unwrap(), Some(10));
    assert_eq!(list.get(&mut session, &1).unwrap(), Some(11));
}

#[test]
fn put_if_absent_does_not_overwrite() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    let mut session = TxSession::new();

    assert_eq!(list.put_if_absent(&mut session, 1, 10).unwrap(), None);
    assert_eq!(list.put_if_absent(&mut session, 1, 99).unwrap(), Some(10));
    assert_eq!(list.get(&mut session, &1).unwrap(), Some(10));
}

#[test]
fn remove_returns_removed_value_then_none() {
    let list = seeded(&[1, 2, 3]);
    let mut session = TxSession::new();

    assert_eq!(list.remove(&mut session, &2).unwrap(), Some(20));
    assert_eq!(list.remove(&mut session, &2).unwrap(), None);
    assert!(!list.contains_key(&mut session, &2).unwrap());
    assert_eq!(scan_values(&list), vec![10, 30]);
}

#[test]
fn keys_stay_sorted_regardless_of_insert_order() {
    let list = seeded(&[42, 7, 19, 3, 88, 55]);
    assert_eq!(scan_values(&list), vec![30, 70, 190, 420, 550, 880]);
}

#[test]
fn operations_on_missing_keys_are_benign() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    let mut session = TxSession::new();

    assert_eq!(list.get(&mut session, &5).unwrap(), None);
    assert!(!list.contains_key(&mut session, &5).unwrap());
    assert_eq!(list.remove(&mut session, &5).unwrap(), None);
    assert_eq!(list.size(&mut session).unwrap(), 0);
}

#[test]
fn singleton_operations_do_not_advance_the_clock() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    let mut session = TxSession::new();

    let before = list.clock().current();
    list.put(&mut session, 1, 10).unwrap();
    list.remove(&mut session, &1).unwrap();
    assert_eq!(list.clock().current(), before);
}

// ============================================================================
// Concurrent singleton access
// ============================================================================

#[test]
fn disjoint_concurrent_inserts_all_land() {
    let list: Arc<OrderedList<i64, i64>> = Arc::new(OrderedList::new());
    let threads = 4;
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads as i64)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut session = TxSession::new();
                barrier.wait();
                for i in 0..per_thread {
                    let key = t * per_thread + i;
                    assert_eq!(list.put(&mut session, key, key).unwrap(), None);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut session = TxSession::new();
    assert_eq!(
        list.size(&mut session).unwrap(),
        threads * per_thread as usize
    );
    let values = scan_values(&list);
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn contended_inserts_on_one_key_keep_one_winner() {
    let list: Arc<OrderedList<i64, String>> = Arc::new(OrderedList::new());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut session = TxSession::new();
                barrier.wait();
                list.put_if_absent(&mut session, 1, format!("t{t}")).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // exactly one thread observed an empty slot
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);

    let mut session = TxSession::new();
    assert_eq!(list.size(&mut session).unwrap(), 1);
}

#[test]
fn concurrent_put_remove_churn_terminates_consistently() {
    let list: Arc<OrderedList<i64, i64>> = Arc::new(OrderedList::new());
    let threads = 4;
    let rounds = 300;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads as i64)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut session = TxSession::new();
                barrier.wait();
                for i in 0..rounds {
                    // all threads fight over a small shared key range
                    let key = (t + i) % 8;
                    if i % 2 == 0 {
                        list.put(&mut session, key, i).unwrap();
                    } else {
                        list.remove(&mut session, &key).unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // structure survives churn: sorted scan, size agrees with scan length
    let values = scan_values(&list);
    let mut session = TxSession::new();
    assert_eq!(list.size(&mut session).unwrap(), values.len());
}
