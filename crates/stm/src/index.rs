//! Predecessor index
//!
//! Auxiliary map from key to node that shortcuts predecessor search, so a
//! traversal starts near its target instead of scanning from the head. The
//! index is internally synchronized and maintained independently of node
//! locks; it is allowed to lag behind structural list changes. A returned
//! predecessor is always reachable from the head, and traversal code restores
//! exactness by refining forward from it.

use crate::node::{Node, NodeRef};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

pub(crate) struct PredIndex<K, V> {
    head: NodeRef<K, V>,
    map: RwLock<BTreeMap<K, NodeRef<K, V>>>,
}

impl<K: Ord + Clone, V> PredIndex<K, V> {
    pub(crate) fn new(head: NodeRef<K, V>) -> Self {
        PredIndex {
            head,
            map: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a node after it was structurally linked.
    pub(crate) fn add(&self, node: NodeRef<K, V>) {
        let key = match unsafe { node.deref() }.key() {
            Some(k) => k.clone(),
            None => return,
        };
        self.map.write().insert(key, node);
    }

    /// Drop a node's entry after it was structurally unlinked. Conditional on
    /// identity so a lagging removal cannot evict a newer node that reused
    /// the same key.
    pub(crate) fn remove(&self, node: NodeRef<K, V>) {
        let key = match unsafe { node.deref() }.key() {
            Some(k) => k,
            None => return,
        };
        let mut map = self.map.write();
        if map.get(key) == Some(&node) {
            map.remove(key);
        }
    }

    /// Best-guess predecessor for `key`: the greatest indexed node strictly
    /// below it, falling back to the head sentinel.
    pub(crate) fn pred_of_key(&self, key: &K) -> NodeRef<K, V> {
        let map = self.map.read();
        map.range((Bound::Unbounded, Bound::Excluded(key)))
            .next_back()
            .map(|(_, node)| *node)
            .unwrap_or(self.head)
    }

    /// Best-guess predecessor of an existing node (head's predecessor is the
    /// head itself).
    pub(crate) fn pred_of(&self, node: &Node<K, V>) -> NodeRef<K, V> {
        match node.key() {
            Some(k) => self.pred_of_key(k),
            None => self.head,
        }
    }
}
