//! Transactional ordered list
//!
//! The public ordered map. Every operation is implemented twice and
//! dispatches on the session's transaction flag:
//!
//! - **Singleton path**: classic fine-grained optimistic traversal. Walk
//!   forward comparing keys, start the traversal over from a refined
//!   predecessor whenever a locked or deleted node is observed mid-walk, lock
//!   exactly the nodes the change needs, re-validate the neighborhood under
//!   the lock, apply, stamp the current clock reading with the singleton
//!   marker, unlock, update the index. Cannot abort.
//! - **Transactional path**: walk through validating accessors that abort
//!   eagerly on any observation newer than the snapshot, buffer the intended
//!   effect in the session's write-set (read-your-own-writes overlay), and
//!   leave the durable state untouched until commit.
//!
//! Commit locks the write-set in key order, validates the read-set against
//! the snapshot version, advances the clock once, publishes every pending
//! change under the node locks, then updates the index and retires unlinked
//! nodes through the epoch collector.

use crate::clock::VersionClock;
use crate::index::PredIndex;
use crate::iter::{IterMode, RangeIter};
use crate::node::{Node, NodeRef};
use crate::runner::TransactionRunner;
use crate::session::TxSession;
use crossbeam_epoch::{self as epoch, Guard, Owned};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{fence, Ordering};
use txlist_core::{AbortReason, Error, Result};

/// Ordered key-value map with a transactional and a singleton execution mode.
///
/// Shared across threads behind an `Arc`; all synchronization is node-local.
pub struct OrderedList<K, V> {
    head: Box<Node<K, V>>,
    index: PredIndex<K, V>,
    clock: VersionClock,
}

impl<K, V> OrderedList<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Create an empty list.
    pub fn new() -> Self {
        let head = Box::new(Node::head());
        let head_ref = NodeRef::from_node(&head);
        OrderedList {
            head,
            index: PredIndex::new(head_ref),
            clock: VersionClock::new(),
        }
    }

    /// The list's logical clock.
    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    /// Retry driver bound to this list.
    pub fn runner(&self) -> TransactionRunner<'_, K, V> {
        TransactionRunner::new(self)
    }

    pub(crate) fn head_ref(&self) -> NodeRef<K, V> {
        NodeRef::from_node(&self.head)
    }

    // ========================================================================
    // Predecessor / successor access
    // ========================================================================

    /// Singleton-mode predecessor search: refine through the index while the
    /// candidate is locked or deleted. Terminates because the head sentinel
    /// is a never-deleted fallback.
    pub(crate) fn get_pred_singleton(&self, key: &K) -> NodeRef<K, V> {
        let head = self.head_ref();
        let mut pred = self.index.pred_of_key(key);
        loop {
            let p = unsafe { pred.deref() };
            if !p.is_locked_or_deleted() {
                return pred;
            }
            if pred == head {
                return head;
            }
            pred = self.index.pred_of(p);
        }
    }

    /// Transactional predecessor search: instead of refining on lock state,
    /// validate eagerly and abort on anything the snapshot cannot explain.
    /// Nodes this transaction tombstoned, and durably tombstoned nodes, are
    /// skipped to their own predecessor.
    pub(crate) fn get_pred(&self, key: &K, session: &TxSession<K, V>) -> Result<NodeRef<K, V>> {
        let mut pred = self.index.pred_of_key(key);
        loop {
            let p = unsafe { pred.deref() };
            if p.is_locked() {
                return Err(Error::abort(AbortReason::LockedNode));
            }
            if p.version() > session.read_version {
                return Err(Error::abort(AbortReason::VersionSkew));
            }
            if p.is_same_version_and_singleton(session.read_version) {
                // A singleton writer stamped our exact snapshot version; bump
                // the clock so the retry starts from a newer snapshot.
                self.clock.advance();
                return Err(Error::abort(AbortReason::SingletonInterference));
            }
            if let Some(pending) = session.pending(&pred) {
                if pending.deleted {
                    debug_assert!(pred != self.head_ref());
                    pred = self.index.pred_of(p);
                    continue;
                }
            }
            if p.is_deleted() {
                debug_assert!(pred != self.head_ref());
                pred = self.index.pred_of(p);
            } else {
                return Ok(pred);
            }
        }
    }

    /// Transactional successor read: the write-set overlay first
    /// (read-your-own-writes), otherwise a fence-protected double read of the
    /// durable link, aborting on lock, version skew, or the singleton marker.
    pub(crate) fn get_next(
        &self,
        node: NodeRef<K, V>,
        session: &TxSession<K, V>,
        guard: &Guard,
    ) -> Result<NodeRef<K, V>> {
        if let Some(pending) = session.pending(&node) {
            return Ok(pending.next);
        }
        let n = unsafe { node.deref() };
        // lock state and next cannot be read at once, so check the lock,
        // read next, then re-check lock and version
        if n.is_locked() {
            return Err(Error::abort(AbortReason::LockedNode));
        }
        fence(Ordering::Acquire);
        let next = n.next_shared(guard);
        fence(Ordering::Acquire);
        if n.is_locked() {
            return Err(Error::abort(AbortReason::LockedNode));
        }
        if n.version() > session.read_version {
            return Err(Error::abort(AbortReason::VersionSkew));
        }
        if n.is_same_version_and_singleton(session.read_version) {
            self.clock.advance();
            return Err(Error::abort(AbortReason::SingletonInterference));
        }
        Ok(NodeRef::from_shared(next))
    }

    /// Value of `node` as this transaction sees it: pending write first,
    /// durable value otherwise.
    pub(crate) fn overlay_value(
        &self,
        node: NodeRef<K, V>,
        session: &TxSession<K, V>,
        guard: &Guard,
    ) -> Option<V> {
        if let Some(pending) = session.pending(&node) {
            return pending.value.clone();
        }
        unsafe { node.deref() }.clone_value(guard)
    }

    // ========================================================================
    // put
    // ========================================================================

    /// Associate `value` with `key`, returning the previous value if the key
    /// was present. Inside a transaction this may return the abort signal,
    /// which the retry driver recovers; singleton calls cannot abort.
    pub fn put(&self, session: &mut TxSession<K, V>, key: K, value: V) -> Result<Option<V>> {
        if !session.active {
            return Ok(self.put_singleton(key, value));
        }
        session.read_only = false;
        let guard = epoch::pin();

        let mut pred = self.get_pred(&key, session)?;
        let mut next = self.get_next(pred, session, &guard)?;
        let mut found = false;

        while !next.is_null() {
            match unsafe { next.deref() }.key_cmp(&key) {
                CmpOrdering::Equal => {
                    found = true;
                    break;
                }
                CmpOrdering::Less => {
                    pred = next;
                    next = self.get_next(pred, session, &guard)?;
                }
                CmpOrdering::Greater => break,
            }
        }

        if found {
            let prev = self.overlay_value(next, session, &guard);
            let (pending_next, pending_deleted) = match session.pending(&next) {
                Some(p) => (p.next, p.deleted),
                None => (
                    NodeRef::from_shared(unsafe { next.deref() }.next_shared(&guard)),
                    false,
                ),
            };
            session.record_write(next, pending_next, Some(value), pending_deleted);
            session.read_set.insert(next);
            return Ok(prev);
        }

        // Key absent: allocate the node now, publish it only at commit.
        let node = Owned::new(Node::new(Some(key), Some(value))).into_shared(&guard);
        unsafe { node.deref() }.set_next(next.as_shared());
        let node_ref = NodeRef::from_shared(node);
        session.created.push(node_ref);

        let pred_value = self.overlay_value(pred, session, &guard);
        session.record_write(pred, node_ref, pred_value, false);
        session.index_add.push(node_ref);
        session.read_set.insert(pred);
        Ok(None)
    }

    fn put_singleton(&self, key: K, value: V) -> Option<V> {
        let guard = epoch::pin();

        'retry: loop {
            let pred_ref = self.get_pred_singleton(&key);
            let mut pred = unsafe { pred_ref.deref() };
            if pred.is_locked() {
                continue;
            }
            fence(Ordering::Acquire);
            let mut next = pred.next_shared(&guard);
            fence(Ordering::Acquire);
            if pred.is_locked_or_deleted() {
                continue;
            }

            while let Some(nx) = unsafe { next.as_ref() } {
                if nx.is_locked_or_deleted() {
                    // a locked node mid-walk forces a fresh traversal
                    continue 'retry;
                }

                match nx.key_cmp(&key) {
                    CmpOrdering::Equal => {
                        // key exists: replace the value in place
                        let node_shared = pred.next_shared(&guard);
                        let node = match unsafe { node_shared.as_ref() } {
                            Some(n) => n,
                            None => continue 'retry,
                        };
                        if !node.try_lock() {
                            continue 'retry;
                        }
                        if node.key_cmp(&key) != CmpOrdering::Equal
                            || node_shared != next
                            || node.is_deleted()
                        {
                            node.unlock();
                            continue 'retry;
                        }
                        let prev = node.replace_value(Some(value), &guard);
                        node.stamp_locked(self.clock.current(), false, true);
                        node.unlock();
                        return prev;
                    }
                    CmpOrdering::Greater => {
                        // key absent: link a new node before `next`
                        if !pred.try_lock() {
                            continue 'retry;
                        }
                        if pred.is_deleted() || pred.next_shared(&guard) != next {
                            pred.unlock();
                            continue 'retry;
                        }
                        let node = Owned::new(Node::new(Some(key), Some(value)))
                            .into_shared(&guard);
                        let n = unsafe { node.deref() };
                        n.set_next(next);
                        n.stamp_fresh(self.clock.current(), true);
                        pred.set_next(node);
                        pred.unlock();
                        self.index.add(NodeRef::from_shared(node));
                        return None;
                    }
                    CmpOrdering::Less => {
                        if nx.is_locked() || pred.next_shared(&guard) != next {
                            continue 'retry;
                        }
                        fence(Ordering::Acquire);
                        let advanced = pred.next_shared(&guard);
                        pred = match unsafe { advanced.as_ref() } {
                            Some(p) => p,
                            None => continue 'retry,
                        };
                        next = pred.next_shared(&guard);
                        fence(Ordering::Acquire);
                        if pred.is_locked_or_deleted() {
                            continue 'retry;
                        }
                    }
                }
            }

            // every key is strictly less: append at the tail
            if pred.try_lock() {
                if pred.is_deleted() || !pred.next_shared(&guard).is_null() {
                    pred.unlock();
                    continue;
                }
                let node = Owned::new(Node::new(Some(key), Some(value))).into_shared(&guard);
                let n = unsafe { node.deref() };
                n.stamp_fresh(self.clock.current(), true);
                pred.set_next(node);
                pred.unlock();
                self.index.add(NodeRef::from_shared(node));
                return None;
            }
        }
    }

    // ========================================================================
    // put_if_absent
    // ========================================================================

    /// Associate `value` with `key` only if the key is absent; returns the
    /// existing value otherwise.
    pub fn put_if_absent(
        &self,
        session: &mut TxSession<K, V>,
        key: K,
        value: V,
    ) -> Result<Option<V>> {
        if !session.active {
            return Ok(self.put_if_absent_singleton(key, value));
        }
        session.read_only = false;
        let guard = epoch::pin();

        let mut pred = self.get_pred(&key, session)?;
        let mut next = self.get_next(pred, session, &guard)?;
        let mut found = false;

        while !next.is_null() {
            match unsafe { next.deref() }.key_cmp(&key) {
                CmpOrdering::Equal => {
                    found = true;
                    break;
                }
                CmpOrdering::Greater => break,
                CmpOrdering::Less => {
                    pred = next;
                    next = self.get_next(pred, session, &guard)?;
                }
            }
        }

        if found {
            let value = self.overlay_value(next, session, &guard);
            // post-validate the node the value came from, so even a read-only
            // transaction cannot return a value newer than its snapshot
            self.get_next(next, session, &guard)?;
            session.read_set.insert(next);
            return Ok(value);
        }

        let node = Owned::new(Node::new(Some(key), Some(value))).into_shared(&guard);
        unsafe { node.deref() }.set_next(next.as_shared());
        let node_ref = NodeRef::from_shared(node);
        session.created.push(node_ref);

        let pred_value = self.overlay_value(pred, session, &guard);
        session.record_write(pred, node_ref, pred_value, false);
        session.index_add.push(node_ref);
        session.read_set.insert(pred);
        Ok(None)
    }

    fn put_if_absent_singleton(&self, key: K, value: V) -> Option<V> {
        let guard = epoch::pin();

        'retry: loop {
            let pred_ref = self.get_pred_singleton(&key);
            let mut pred = unsafe { pred_ref.deref() };
            if pred.is_locked() {
                continue;
            }
            fence(Ordering::Acquire);
            let mut next = pred.next_shared(&guard);
            fence(Ordering::Acquire);
            if pred.is_locked_or_deleted() {
                continue;
            }

            while let Some(nx) = unsafe { next.as_ref() } {
                if nx.is_locked_or_deleted() {
                    continue 'retry;
                }

                match nx.key_cmp(&key) {
                    CmpOrdering::Equal => {
                        // key exists: report its value without locking
                        let node_shared = pred.next_shared(&guard);
                        let node = match unsafe { node_shared.as_ref() } {
                            Some(n) => n,
                            None => continue 'retry,
                        };
                        if node.key_cmp(&key) != CmpOrdering::Equal
                            || node_shared != next
                            || node.is_locked_or_deleted()
                        {
                            continue 'retry;
                        }
                        return node.clone_value(&guard);
                    }
                    CmpOrdering::Greater => {
                        if !pred.try_lock() {
                            continue 'retry;
                        }
                        if pred.is_deleted() || pred.next_shared(&guard) != next {
                            pred.unlock();
                            continue 'retry;
                        }
                        let node = Owned::new(Node::new(Some(key), Some(value)))
                            .into_shared(&guard);
                        let n = unsafe { node.deref() };
                        n.set_next(next);
                        n.stamp_fresh(self.clock.current(), true);
                        pred.set_next(node);
                        pred.unlock();
                        self.index.add(NodeRef::from_shared(node));
                        return None;
                    }
                    CmpOrdering::Less => {
                        if nx.is_locked() || pred.next_shared(&guard) != next {
                            continue 'retry;
                        }
                        fence(Ordering::Acquire);
                        let advanced = pred.next_shared(&guard);
                        pred = match unsafe { advanced.as_ref() } {
                            Some(p) => p,
                            None => continue 'retry,
                        };
                        next = pred.next_shared(&guard);
                        fence(Ordering::Acquire);
                        if pred.is_locked_or_deleted() {
                            continue 'retry;
                        }
                    }
                }
            }

            if pred.try_lock() {
                if pred.is_deleted() || !pred.next_shared(&guard).is_null() {
                    pred.unlock();
                    continue;
                }
                let node = Owned::new(Node::new(Some(key), Some(value))).into_shared(&guard);
                let n = unsafe { node.deref() };
                n.stamp_fresh(self.clock.current(), true);
                pred.set_next(node);
                pred.unlock();
                self.index.add(NodeRef::from_shared(node));
                return None;
            }
        }
    }

    // ========================================================================
    // remove
    // ========================================================================

    /// Remove `key`, returning its previous value if it was present.
    pub fn remove(&self, session: &mut TxSession<K, V>, key: &K) -> Result<Option<V>> {
        if !session.active {
            return Ok(self.remove_singleton(key));
        }
        session.read_only = false;
        let guard = epoch::pin();

        let mut pred = self.get_pred(key, session)?;
        let mut next = self.get_next(pred, session, &guard)?;
        let mut found = false;

        while !next.is_null() {
            match unsafe { next.deref() }.key_cmp(key) {
                CmpOrdering::Equal => {
                    found = true;
                    break;
                }
                CmpOrdering::Greater => break,
                CmpOrdering::Less => {
                    pred = next;
                    next = self.get_next(pred, session, &guard)?;
                }
            }
        }

        if !found {
            session.read_set.insert(pred);
            return Ok(None);
        }

        let prev = self.overlay_value(next, session, &guard);
        let after_target = self.get_next(next, session, &guard)?;
        let pred_value = self.overlay_value(pred, session, &guard);
        session.record_write(pred, after_target, pred_value, false);
        session.record_write(next, after_target, None, true);
        session.read_set.insert(next);
        session.read_set.insert(pred);
        session.index_remove.push(next);
        Ok(prev)
    }

    fn remove_singleton(&self, key: &K) -> Option<V> {
        let guard = epoch::pin();

        'retry: loop {
            let pred_ref = self.get_pred_singleton(key);
            let mut pred = unsafe { pred_ref.deref() };
            if pred.is_locked() {
                continue;
            }
            fence(Ordering::Acquire);
            let mut next = pred.next_shared(&guard);
            fence(Ordering::Acquire);
            if pred.is_locked_or_deleted() {
                continue;
            }

            while let Some(nx) = unsafe { next.as_ref() } {
                if nx.is_locked_or_deleted() {
                    continue 'retry;
                }

                match nx.key_cmp(key) {
                    CmpOrdering::Less => {
                        if nx.is_locked() || pred.next_shared(&guard) != next {
                            continue 'retry;
                        }
                        fence(Ordering::Acquire);
                        let advanced = pred.next_shared(&guard);
                        pred = match unsafe { advanced.as_ref() } {
                            Some(p) => p,
                            None => continue 'retry,
                        };
                        next = pred.next_shared(&guard);
                        fence(Ordering::Acquire);
                        if pred.is_locked_or_deleted() {
                            continue 'retry;
                        }
                    }
                    CmpOrdering::Greater => {
                        if pred.next_shared(&guard) != next {
                            continue 'retry;
                        }
                        return None;
                    }
                    CmpOrdering::Equal => {
                        if !pred.try_lock() {
                            continue 'retry;
                        }
                        if pred.is_deleted() || pred.next_shared(&guard) != next {
                            pred.unlock();
                            continue 'retry;
                        }
                        let target = nx;
                        if !target.try_lock() {
                            pred.unlock();
                            continue 'retry;
                        }
                        let prev = target.replace_value(None, &guard);
                        pred.set_next(target.next_shared(&guard));
                        let version = self.clock.current();
                        target.stamp_locked(version, true, true);
                        pred.stamp_locked(version, false, true);
                        target.unlock();
                        pred.unlock();
                        let target_ref = NodeRef::from_shared(next);
                        self.index.remove(target_ref);
                        unsafe { guard.defer_destroy(next) };
                        return prev;
                    }
                }
            }

            return None;
        }
    }

    // ========================================================================
    // contains_key / get
    // ========================================================================

    /// True if `key` is present.
    pub fn contains_key(&self, session: &mut TxSession<K, V>, key: &K) -> Result<bool> {
        if !session.active {
            return Ok(self.contains_key_singleton(key));
        }
        let guard = epoch::pin();

        let mut pred = self.get_pred(key, session)?;
        let mut next = self.get_next(pred, session, &guard)?;

        while !next.is_null() && unsafe { next.deref() }.key_cmp(key) == CmpOrdering::Less {
            pred = next;
            next = self.get_next(pred, session, &guard)?;
        }

        session.read_set.insert(pred);

        if next.is_null() {
            return Ok(false);
        }
        Ok(unsafe { next.deref() }.key_cmp(key) == CmpOrdering::Equal)
    }

    fn contains_key_singleton(&self, key: &K) -> bool {
        let guard = epoch::pin();
        let mut pred: Option<&Node<K, V>> = None;
        let mut start_over = true;

        loop {
            let p = if start_over {
                unsafe { self.get_pred_singleton(key).deref() }
            } else {
                // advance one step; a vanished successor forces a restart
                let advanced = pred.map(|p| p.next_shared(&guard));
                match advanced.and_then(|s| unsafe { s.as_ref() }) {
                    Some(p) => p,
                    None => {
                        start_over = true;
                        continue;
                    }
                }
            };
            start_over = false;

            if p.is_locked() {
                start_over = true;
                continue;
            }
            fence(Ordering::Acquire);
            let next = p.next_shared(&guard);
            fence(Ordering::Acquire);
            if p.is_locked_or_deleted() {
                start_over = true;
                continue;
            }

            match unsafe { next.as_ref() } {
                None => return false,
                Some(nx) => match nx.key_cmp(key) {
                    CmpOrdering::Greater => return false,
                    CmpOrdering::Equal => return true,
                    CmpOrdering::Less => {
                        if p.next_shared(&guard) != next {
                            start_over = true;
                        }
                        pred = Some(p);
                    }
                },
            }
        }
    }

    /// Value associated with `key`, if present.
    pub fn get(&self, session: &mut TxSession<K, V>, key: &K) -> Result<Option<V>> {
        if !session.active {
            return Ok(self.get_singleton(key));
        }
        let guard = epoch::pin();

        let mut pred = self.get_pred(key, session)?;
        let mut next = self.get_next(pred, session, &guard)?;

        while !next.is_null() && unsafe { next.deref() }.key_cmp(key) == CmpOrdering::Less {
            pred = next;
            next = self.get_next(pred, session, &guard)?;
        }

        session.read_set.insert(pred);

        if next.is_null() || unsafe { next.deref() }.key_cmp(key) == CmpOrdering::Greater {
            return Ok(None);
        }
        let value = self.overlay_value(next, session, &guard);
        // post-validate the node the value came from, so even a read-only
        // transaction cannot return a value newer than its snapshot
        self.get_next(next, session, &guard)?;
        session.read_set.insert(next);
        Ok(value)
    }

    fn get_singleton(&self, key: &K) -> Option<V> {
        let guard = epoch::pin();
        let mut pred: Option<&Node<K, V>> = None;
        let mut start_over = true;

        loop {
            let p = if start_over {
                unsafe { self.get_pred_singleton(key).deref() }
            } else {
                let advanced = pred.map(|p| p.next_shared(&guard));
                match advanced.and_then(|s| unsafe { s.as_ref() }) {
                    Some(p) => p,
                    None => {
                        start_over = true;
                        continue;
                    }
                }
            };
            start_over = false;

            if p.is_locked() {
                start_over = true;
                continue;
            }
            fence(Ordering::Acquire);
            let next = p.next_shared(&guard);
            fence(Ordering::Acquire);
            if p.is_locked_or_deleted() {
                start_over = true;
                continue;
            }

            match unsafe { next.as_ref() } {
                None => return None,
                Some(nx) => match nx.key_cmp(key) {
                    CmpOrdering::Greater => return None,
                    CmpOrdering::Equal => return nx.clone_value(&guard),
                    CmpOrdering::Less => {
                        if p.next_shared(&guard) != next {
                            start_over = true;
                        }
                        pred = Some(p);
                    }
                },
            }
        }
    }

    // ========================================================================
    // Iteration / size
    // ========================================================================

    /// Range iterator over the list.
    ///
    /// `atomic = false` always yields the singleton variant, even inside a
    /// transaction. `atomic = true` yields the transactional variant if a
    /// transaction is active, otherwise the singleton variant. Call one of
    /// the `init*` methods before advancing.
    pub fn iter<'l>(&'l self, session: &TxSession<K, V>, atomic: bool) -> RangeIter<'l, K, V> {
        let mode = if atomic && session.active {
            IterMode::Transactional
        } else {
            IterMode::Singleton
        };
        RangeIter::new(self, mode)
    }

    /// Number of elements, counted by a full scan (transactionally inside an
    /// active transaction).
    pub fn size(&self, session: &mut TxSession<K, V>) -> Result<usize> {
        let mut iter = self.iter(session, true);
        iter.init(session)?;
        let mut count = 0;
        while iter.has_next(session)? {
            iter.next(session)?;
            count += 1;
        }
        Ok(count)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Validate and publish the session's buffered effects.
    ///
    /// Normally invoked by [`TransactionRunner`]; exposed for drivers that
    /// manage their own retry policy. On any abort the session is rolled
    /// back before returning.
    pub fn commit(&self, session: &mut TxSession<K, V>) -> Result<()> {
        if !session.active {
            return Err(Error::InactiveSession("commit".into()));
        }

        // Read-only attempts publish nothing and never advance the clock.
        if session.write_set.is_empty() {
            session.finish();
            return Ok(());
        }

        let guard = epoch::pin();

        // Lock the write-set in key order (head sentinel first) so two
        // committers can never hold-and-wait in opposite orders.
        let mut nodes: Vec<NodeRef<K, V>> = session.write_set.keys().copied().collect();
        nodes.sort_by(|a, b| unsafe { a.deref() }.key().cmp(&unsafe { b.deref() }.key()));

        let mut locked: Vec<NodeRef<K, V>> = Vec::with_capacity(nodes.len());
        for &node in &nodes {
            if unsafe { node.deref() }.try_lock() {
                locked.push(node);
            } else {
                self.release_and_rollback(&locked, session);
                return Err(Error::abort(AbortReason::CommitLockContention));
            }
        }

        // Validate the read-set against the snapshot.
        let read_version = session.read_version;
        let mut failure = None;
        for node in &session.read_set {
            let n = unsafe { node.deref() };
            let owned = session.write_set.contains_key(node);
            if (!owned && n.is_locked()) || n.version() > read_version {
                failure = Some(AbortReason::CommitValidation);
                break;
            }
            if n.is_same_version_and_singleton(read_version) {
                self.clock.advance();
                failure = Some(AbortReason::SingletonInterference);
                break;
            }
        }
        if let Some(reason) = failure {
            self.release_and_rollback(&locked, session);
            return Err(Error::abort(reason));
        }

        let write_version = self.clock.advance();

        // Created nodes are stamped before any pending link makes them
        // reachable. A node both created and tombstoned in this transaction
        // is in the write-set and held locked; its publish below writes the
        // version instead.
        for node in &session.created {
            if !session.write_set.contains_key(node) {
                unsafe { node.deref() }.stamp_fresh(write_version, false);
            }
        }

        let write_set = std::mem::take(&mut session.write_set);
        for (node_ref, pending) in write_set {
            let node = unsafe { node_ref.deref() };
            node.replace_value(pending.value, &guard);
            node.set_next(pending.next.as_shared());
            node.publish(write_version, pending.deleted);
        }

        for node in session.index_add.drain(..) {
            self.index.add(node);
        }
        for node in session.index_remove.drain(..) {
            self.index.remove(node);
            unsafe { guard.defer_destroy(node.as_shared()) };
        }

        tracing::trace!(version = write_version, "transaction committed");
        session.finish();
        Ok(())
    }

    fn release_and_rollback(&self, locked: &[NodeRef<K, V>], session: &mut TxSession<K, V>) {
        for node in locked {
            unsafe { node.deref() }.unlock();
        }
        tracing::trace!(
            reads = session.reads_tracked(),
            writes = session.pending_writes(),
            "commit validation failed, rolling back"
        );
        session.rollback();
    }
}

impl<K, V> Default for OrderedList<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for OrderedList<K, V> {
    fn drop(&mut self) {
        // Exclusive access: free the chain directly, no epoch deferral.
        unsafe {
            let guard = epoch::unprotected();
            let mut cur = self.head.next_shared(guard);
            while let Some(node) = cur.as_ref() {
                let next = node.next_shared(guard);
                drop(cur.into_owned());
                cur = next;
            }
        }
    }
}
