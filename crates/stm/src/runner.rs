//! Transaction retry driver.
//!
//! Wraps the begin / execute / commit cycle and restarts the body whenever
//! it observes an abort, either raised eagerly by a validated accessor or by
//! commit itself. Every retry begins from a fresh snapshot of the clock, so
//! an interfering writer that advanced the clock is visible on the next
//! attempt. Non-abort errors roll the session back and surface unchanged.

use crate::list::OrderedList;
use crate::session::TxSession;
use txlist_core::Result;

/// Runs closures as transactions against one list.
///
/// Obtained from [`OrderedList::runner`]. The closure may run several times;
/// it must confine its side effects to the list and the session.
pub struct TransactionRunner<'l, K, V> {
    list: &'l OrderedList<K, V>,
}

impl<'l, K, V> TransactionRunner<'l, K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub(crate) fn new(list: &'l OrderedList<K, V>) -> Self {
        TransactionRunner { list }
    }

    /// Execute `body` transactionally, retrying on abort until it commits.
    pub fn run<T, F>(&self, session: &mut TxSession<K, V>, mut body: F) -> Result<T>
    where
        F: FnMut(&OrderedList<K, V>, &mut TxSession<K, V>) -> Result<T>,
    {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            session.begin(self.list.clock().current())?;

            match body(self.list, session) {
                Ok(out) => match self.list.commit(session) {
                    Ok(()) => return Ok(out),
                    Err(err) if err.is_abort() => {
                        tracing::trace!(attempt, %err, "commit aborted, retrying");
                    }
                    Err(err) => return Err(err),
                },
                Err(err) if err.is_abort() => {
                    tracing::trace!(attempt, %err, "body aborted, retrying");
                    session.rollback();
                }
                Err(err) => {
                    session.rollback();
                    return Err(err);
                }
            }
        }
    }
}
