//! Range Iteration Tests
//!
//! Range queries in both modes, plus abort-and-retry of transactional scans
//! when a singleton writer disturbs the range mid-scan.

use crate::support::{init_tracing, seeded, settle};
use std::sync::{Arc, Barrier};
use std::thread;
use txlist::{Error, TxSession};

#[test]
fn transactional_scan_sees_a_frozen_range() {
    let list = seeded(&[1, 2, 3, 4, 5]);
    let mut session = TxSession::new();

    let values = list
        .runner()
        .run(&mut session, |list, session| {
            let mut iter = list.iter(session, true);
            iter.init_range(session, &2, 4)?;
            let mut out = Vec::new();
            while iter.has_next(session)? {
                out.push(iter.next(session)?);
            }
            Ok(out)
        })
        .unwrap();

    assert_eq!(values, vec![20, 30, 40]);
}

#[test]
fn scan_includes_writes_pending_in_the_same_transaction() {
    let list = seeded(&[1, 3, 5]);
    let mut session = TxSession::new();

    let values = list
        .runner()
        .run(&mut session, |list, session| {
            list.put(session, 2, 22)?;
            list.remove(session, &5)?;
            let mut iter = list.iter(session, true);
            iter.init(session)?;
            let mut out = Vec::new();
            while iter.has_next(session)? {
                out.push(iter.next(session)?);
            }
            Ok(out)
        })
        .unwrap();

    assert_eq!(values, vec![10, 22, 30]);
}

#[test]
fn removal_ahead_of_the_cursor_restarts_the_scan() {
    let list = seeded(&[1, 2, 3, 4, 5]);
    settle(&list);
    let mut session = TxSession::new();
    let mut singleton = TxSession::new();
    let mut attempts = 0;
    let mut injected = false;

    let values = list
        .runner()
        .run(&mut session, |list, session| {
            attempts += 1;
            let mut iter = list.iter(session, true);
            iter.init(session)?;
            let mut out = Vec::new();
            let mut steps = 0;
            while iter.has_next(session)? {
                out.push(iter.next(session)?);
                steps += 1;
                if !injected && steps == 2 {
                    injected = true;
                    // remove a key the cursor has not reached yet; the
                    // stamped predecessor forces an abort when crossed
                    list.remove(&mut singleton, &4).unwrap();
                }
            }
            Ok(out)
        })
        .unwrap();

    assert_eq!(attempts, 2);
    // the committed scan never shows a state with key 4 half-removed
    assert_eq!(values, vec![10, 20, 30, 50]);
}

#[test]
fn nonatomic_iterator_inside_a_transaction_reads_durable_state() {
    let list = seeded(&[1, 3]);
    let mut session = TxSession::new();

    list.runner()
        .run(&mut session, |list, session| {
            list.put(session, 2, 22)?;
            // atomic=false opts out of the overlay even mid-transaction
            let mut iter = list.iter(session, false);
            iter.init(session)?;
            let mut out = Vec::new();
            while iter.has_next(session)? {
                out.push(iter.next(session)?);
            }
            assert_eq!(out, vec![10, 30]);
            Ok(())
        })
        .unwrap();
}

#[test]
fn exhausted_iterator_errors_instead_of_wrapping() {
    let list = seeded(&[1]);
    let mut session = TxSession::new();
    let mut iter = list.iter(&session, false);
    iter.init(&mut session).unwrap();

    assert_eq!(iter.next(&mut session).unwrap(), 10);
    assert!(matches!(
        iter.next(&mut session),
        Err(Error::IteratorExhausted)
    ));
    // and it stays exhausted
    assert!(!iter.has_next(&mut session).unwrap());
}

#[test]
fn singleton_scans_survive_concurrent_removals() {
    init_tracing();
    let keys: Vec<i64> = (0..100).collect();
    let list = Arc::new(seeded(&keys));
    let barrier = Arc::new(Barrier::new(2));

    let scanner = {
        let list = Arc::clone(&list);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut session = TxSession::new();
            barrier.wait();
            for _ in 0..20 {
                let mut iter = list.iter(&session, false);
                iter.init(&mut session).unwrap();
                let mut last = i64::MIN;
                while iter.has_next(&mut session).unwrap() {
                    let v = iter.next(&mut session).unwrap();
                    // values arrive in strictly increasing key order
                    assert!(v > last);
                    last = v;
                }
            }
        })
    };
    let remover = {
        let list = Arc::clone(&list);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut session = TxSession::new();
            barrier.wait();
            for key in (0..100).step_by(2) {
                list.remove(&mut session, &key).unwrap();
            }
        })
    };

    scanner.join().unwrap();
    remover.join().unwrap();

    let mut session = TxSession::new();
    assert_eq!(list.size(&mut session).unwrap(), 50);
}
