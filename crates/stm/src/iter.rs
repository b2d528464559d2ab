//! Range iteration over the ordered list.
//!
//! A [`RangeIter`] is a cursor that must be positioned with one of the
//! `init*` methods before advancing. Both range bounds are inclusive and the
//! lower bound positions the cursor with a predecessor search, so iteration
//! starts at the smallest key greater than or equal to `from`.
//!
//! The iterator comes in two flavors chosen at creation time. The singleton
//! flavor reads durable state directly with the same fence-protected double
//! read the point operations use, skipping deleted nodes. The transactional
//! flavor routes every advance through the session's validated accessors, so
//! each visited node joins the read-set and the whole scan is certified at
//! commit.

use crate::list::OrderedList;
use crate::node::NodeRef;
use crate::session::TxSession;
use crossbeam_epoch::{self as epoch, Guard};
use std::sync::atomic::{fence, Ordering};
use txlist_core::{Error, Result};

/// Execution flavor of a [`RangeIter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterMode {
    Singleton,
    Transactional,
}

/// Cursor over the list, created by [`OrderedList::iter`].
///
/// The iterator pins an epoch guard for its whole lifetime, so every node
/// the cursor has reached stays allocated even if concurrently unlinked.
pub struct RangeIter<'l, K, V> {
    list: &'l OrderedList<K, V>,
    mode: IterMode,
    node: NodeRef<K, V>,
    end: Option<K>,
    initialized: bool,
    guard: Guard,
}

impl<'l, K, V> RangeIter<'l, K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub(crate) fn new(list: &'l OrderedList<K, V>, mode: IterMode) -> Self {
        RangeIter {
            list,
            mode,
            node: NodeRef::null(),
            end: None,
            initialized: false,
            guard: epoch::pin(),
        }
    }

    /// Position the cursor before the first element; no upper bound.
    pub fn init(&mut self, session: &mut TxSession<K, V>) -> Result<()> {
        self.end = None;
        self.node = self.list.head_ref();
        if self.mode == IterMode::Transactional {
            session.read_set.insert(self.node);
        }
        self.initialized = true;
        Ok(())
    }

    /// Position the cursor before the first key `>= from`; no upper bound.
    pub fn init_from(&mut self, session: &mut TxSession<K, V>, from: &K) -> Result<()> {
        self.end = None;
        self.node = match self.mode {
            IterMode::Singleton => self.list.get_pred_singleton(from),
            IterMode::Transactional => {
                let pred = self.list.get_pred(from, session)?;
                session.read_set.insert(pred);
                pred
            }
        };
        self.initialized = true;
        Ok(())
    }

    /// Position the cursor before the first element; stop after `end`
    /// (inclusive).
    pub fn init_up_to(&mut self, session: &mut TxSession<K, V>, end: K) -> Result<()> {
        self.init(session)?;
        self.end = Some(end);
        Ok(())
    }

    /// Position the cursor before the first key `>= from`; stop after `end`
    /// (inclusive).
    pub fn init_range(&mut self, session: &mut TxSession<K, V>, from: &K, end: K) -> Result<()> {
        if *from > end {
            return Err(Error::invalid_argument("range start exceeds range end"));
        }
        self.init_from(session, from)?;
        self.end = Some(end);
        Ok(())
    }

    /// Whether an element remains within the range. Does not advance the
    /// cursor.
    pub fn has_next(&mut self, session: &mut TxSession<K, V>) -> Result<bool> {
        let next = self.peek(session)?;
        if next.is_null() {
            return Ok(false);
        }
        Ok(!self.beyond_end(next))
    }

    /// Advance to the next element and return its value. Returns
    /// [`Error::IteratorExhausted`] when the cursor is at the end of the list
    /// or the next key lies past the upper bound.
    pub fn next(&mut self, session: &mut TxSession<K, V>) -> Result<V> {
        loop {
            let next = self.peek(session)?;
            if next.is_null() || self.beyond_end(next) {
                return Err(Error::IteratorExhausted);
            }
            self.node = next;
            match self.mode {
                IterMode::Singleton => {
                    // the value can race with a concurrent removal between
                    // the link read and the clone; a vanished value means the
                    // node is being deleted, so step again
                    if let Some(value) = unsafe { next.deref() }.clone_value(&self.guard) {
                        return Ok(value);
                    }
                }
                IterMode::Transactional => {
                    session.read_set.insert(next);
                    let value = self.list.overlay_value(next, session, &self.guard);
                    // post-validate the node the value came from; a commit
                    // that landed between the link read and the value read
                    // shows up as skew here
                    self.list.get_next(next, session, &self.guard)?;
                    match value {
                        Some(value) => return Ok(value),
                        None => {
                            return Err(Error::abort(
                                txlist_core::AbortReason::VersionSkew,
                            ))
                        }
                    }
                }
            }
        }
    }

    fn peek(&self, session: &TxSession<K, V>) -> Result<NodeRef<K, V>> {
        if !self.initialized {
            return Err(Error::InvalidArgument(
                "iterator advanced before init".into(),
            ));
        }
        match self.mode {
            IterMode::Singleton => Ok(self.singleton_step()),
            IterMode::Transactional => self.list.get_next(self.node, session, &self.guard),
        }
    }

    fn beyond_end(&self, node: NodeRef<K, V>) -> bool {
        match (&self.end, unsafe { node.deref() }.key()) {
            (Some(end), Some(key)) => key > end,
            _ => false,
        }
    }

    /// Durable successor of the cursor, skipping nodes observed mid-removal.
    fn singleton_step(&self) -> NodeRef<K, V> {
        let pred = unsafe { self.node.deref() };
        loop {
            if pred.is_locked() {
                std::hint::spin_loop();
                continue;
            }
            fence(Ordering::Acquire);
            let next = pred.next_shared(&self.guard);
            fence(Ordering::Acquire);
            if pred.is_locked() {
                continue;
            }
            if let Some(nx) = unsafe { next.as_ref() } {
                if nx.is_deleted() {
                    continue;
                }
            }
            return NodeRef::from_shared(next);
        }
    }
}
