//! Version Clock Tests
//!
//! The per-list clock must be monotone, advance exactly once per mutating
//! commit, and stay put for read-only commits and singleton operations.

use std::sync::{Arc, Barrier};
use std::thread;
use txlist::{OrderedList, TxSession};

#[test]
fn clock_starts_at_zero() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    assert_eq!(list.clock().current(), 0);
}

#[test]
fn each_mutating_commit_advances_by_one() {
    let list: OrderedList<i64, i64> = OrderedList::new();
    let mut session = TxSession::new();
    let runner = list.runner();

    for i in 0..5 {
        let before = list.clock().current();
        runner
            .run(&mut session, |list, session| list.put(session, i, i))
            .unwrap();
        assert_eq!(list.clock().current(), before + 1);
    }
}

#[test]
fn concurrent_commits_get_distinct_versions() {
    let list: Arc<OrderedList<i64, u64>> = Arc::new(OrderedList::new());
    let threads = 4;
    let commits_each = 100;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads as i64)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut session = TxSession::new();
                let runner = list.runner();
                barrier.wait();
                for i in 0..commits_each as i64 {
                    runner
                        .run(&mut session, |list, session| {
                            list.put(session, t * 1000 + i, 0)
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // aborted attempts may advance the clock further, never less
    assert!(list.clock().current() >= (threads * commits_each) as u64);
}
