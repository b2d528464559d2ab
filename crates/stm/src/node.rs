//! Versioned, lockable list node
//!
//! Each node packs its lock bit, deleted bit, singleton bit, and last-modified
//! version into one `AtomicU64`, so readers get a consistent snapshot of
//! version-plus-flags from a single acquire load. Writers mutate a node only
//! while holding its lock bit and publish with release stores, so an
//! unlocked reader that re-validates the word after reading `next` or the
//! value can never act on a partially applied mutation.
//!
//! Node memory is managed through the epoch collector: an unlinked node stays
//! valid for any traversal that was pinned before the unlink was retired.

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock bit: node is being mutated.
const LOCK_BIT: u64 = 1;

/// Deleted bit: node is a tombstone (possibly still transiently reachable).
const DELETED_BIT: u64 = 1 << 1;

/// Singleton bit: the last mutation came from a non-transactional operation.
const SINGLETON_BIT: u64 = 1 << 2;

/// Version occupies the remaining high bits.
const VERSION_SHIFT: u32 = 3;

/// An element of the ordered list.
///
/// `key` is `None` only for the head sentinel, which sorts below every real
/// key, never carries a value, and is never deleted.
pub(crate) struct Node<K, V> {
    key: Option<K>,
    value: Atomic<V>,
    next: Atomic<Node<K, V>>,
    word: AtomicU64,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: Option<K>, value: Option<V>) -> Self {
        Node {
            key,
            value: value.map(Atomic::new).unwrap_or_else(Atomic::null),
            next: Atomic::null(),
            word: AtomicU64::new(0),
        }
    }

    /// Head sentinel: minimal key, no value.
    pub(crate) fn head() -> Self {
        Node::new(None, None)
    }

    pub(crate) fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    // === Packed word ===

    /// Non-blocking attempt to set the lock bit.
    pub(crate) fn try_lock(&self) -> bool {
        let word = self.word.load(Ordering::Acquire);
        if word & LOCK_BIT != 0 {
            return false;
        }
        self.word
            .compare_exchange(word, word | LOCK_BIT, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Clear the lock bit. Caller must hold the lock.
    pub(crate) fn unlock(&self) {
        debug_assert!(self.is_locked());
        self.word.fetch_and(!LOCK_BIT, Ordering::Release);
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.word.load(Ordering::Acquire) & LOCK_BIT != 0
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.word.load(Ordering::Acquire) & DELETED_BIT != 0
    }

    pub(crate) fn is_locked_or_deleted(&self) -> bool {
        self.word.load(Ordering::Acquire) & (LOCK_BIT | DELETED_BIT) != 0
    }

    /// Last-modified version.
    pub(crate) fn version(&self) -> u64 {
        self.word.load(Ordering::Acquire) >> VERSION_SHIFT
    }

    /// True if the node was last mutated by a singleton operation at exactly
    /// `version` (a non-transactional writer the caller's snapshot cannot be
    /// ordered against).
    pub(crate) fn is_same_version_and_singleton(&self, version: u64) -> bool {
        let word = self.word.load(Ordering::Acquire);
        word & SINGLETON_BIT != 0 && word >> VERSION_SHIFT == version
    }

    /// Restamp version and flags while holding the lock; the lock bit stays
    /// set until `unlock`.
    pub(crate) fn stamp_locked(&self, version: u64, deleted: bool, singleton: bool) {
        debug_assert!(self.is_locked());
        let mut word = LOCK_BIT | (version << VERSION_SHIFT);
        if deleted {
            word |= DELETED_BIT;
        }
        if singleton {
            word |= SINGLETON_BIT;
        }
        self.word.store(word, Ordering::Release);
    }

    /// Stamp a node nobody else can reach yet (freshly allocated, not linked).
    pub(crate) fn stamp_fresh(&self, version: u64, singleton: bool) {
        let mut word = version << VERSION_SHIFT;
        if singleton {
            word |= SINGLETON_BIT;
        }
        self.word.store(word, Ordering::Release);
    }

    /// Commit-time publication: one release store that sets the version and
    /// the deleted flag, clears the singleton flag, and releases the lock.
    /// Must follow the value/next stores of the same pending change.
    pub(crate) fn publish(&self, version: u64, deleted: bool) {
        debug_assert!(self.is_locked());
        let mut word = version << VERSION_SHIFT;
        if deleted {
            word |= DELETED_BIT;
        }
        self.word.store(word, Ordering::Release);
    }

    // === Successor link ===

    pub(crate) fn next_shared<'g>(&self, guard: &'g Guard) -> Shared<'g, Node<K, V>> {
        self.next.load(Ordering::Acquire, guard)
    }

    /// Rewrite the successor link. Caller must hold the lock (or own the node
    /// exclusively, as with a freshly allocated one).
    pub(crate) fn set_next(&self, next: Shared<'_, Node<K, V>>) {
        self.next.store(next, Ordering::Release);
    }

    // === Value ===

    pub(crate) fn value_ref<'g>(&self, guard: &'g Guard) -> Option<&'g V> {
        let shared = self.value.load(Ordering::Acquire, guard);
        unsafe { shared.as_ref() }
    }

    pub(crate) fn clone_value(&self, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        self.value_ref(guard).cloned()
    }

    /// Swap in a new value (or a tombstone for `None`) and return a clone of
    /// the old one. Caller must hold the lock; the old allocation is retired
    /// through the epoch collector because concurrent readers may still hold
    /// references into it.
    pub(crate) fn replace_value(&self, new: Option<V>, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        let old = match new {
            Some(v) => self.value.swap(Owned::new(v), Ordering::AcqRel, guard),
            None => self.value.swap(Shared::null(), Ordering::AcqRel, guard),
        };
        let prev = unsafe { old.as_ref() }.cloned();
        if !old.is_null() {
            unsafe { guard.defer_destroy(old) };
        }
        prev
    }
}

impl<K: Ord, V> Node<K, V> {
    /// Total order with the head sentinel below every real key.
    pub(crate) fn key_cmp(&self, other: &K) -> CmpOrdering {
        match &self.key {
            None => CmpOrdering::Less,
            Some(k) => k.cmp(other),
        }
    }
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        // The successor is owned by the list, not by this node; only the
        // value allocation is freed here.
        let value = std::mem::replace(&mut self.value, Atomic::null());
        unsafe {
            let shared = value.load(Ordering::Relaxed, crossbeam_epoch::unprotected());
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

/// Address-identity handle to a node.
///
/// Read/write sets, the index, and iterator cursors all refer to nodes by
/// address. Validity is guaranteed by the epoch protocol: a handle recorded
/// while pinned stays dereferenceable until the pin is dropped, because
/// unlink retires nodes through the collector.
pub(crate) struct NodeRef<K, V>(*const Node<K, V>);

impl<K, V> NodeRef<K, V> {
    pub(crate) fn null() -> Self {
        NodeRef(std::ptr::null())
    }

    pub(crate) fn from_node(node: &Node<K, V>) -> Self {
        NodeRef(node as *const _)
    }

    pub(crate) fn from_shared(shared: Shared<'_, Node<K, V>>) -> Self {
        NodeRef(shared.as_raw())
    }

    pub(crate) fn as_shared<'g>(self) -> Shared<'g, Node<K, V>> {
        Shared::from(self.0)
    }

    pub(crate) fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Dereference the handle.
    ///
    /// Safety: the caller must hold an epoch pin that predates any retirement
    /// of this node, or otherwise know the node is still live (e.g. freshly
    /// allocated and unpublished).
    pub(crate) unsafe fn deref<'a>(self) -> &'a Node<K, V> {
        &*self.0
    }
}

impl<K, V> Clone for NodeRef<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<K, V> {}

impl<K, V> PartialEq for NodeRef<K, V> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<K, V> Eq for NodeRef<K, V> {}

impl<K, V> std::hash::Hash for NodeRef<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.0 as usize).hash(state);
    }
}

impl<K, V> std::fmt::Debug for NodeRef<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeRef({:p})", self.0)
    }
}

unsafe impl<K: Send + Sync, V: Send + Sync> Send for NodeRef<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for NodeRef<K, V> {}
