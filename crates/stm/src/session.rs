//! Per-thread transaction workspace
//!
//! The session is the explicit replacement for an implicit thread-local slot:
//! every list operation takes `&mut TxSession`, which makes the read/write
//! data flow auditable and keeps the engine free of hidden global state.
//!
//! A session alternates between two modes. While no transaction is active,
//! operations routed through it take the singleton fast path. Between
//! `begin` and commit/rollback it accumulates the attempt's read-set,
//! write-set overlay, deferred index maintenance, and the nodes it allocated,
//! all of which are published on commit or discarded wholesale on abort.

use crate::node::NodeRef;
use crossbeam_epoch::{self as epoch, Guard};
use std::collections::{HashMap, HashSet};
use txlist_core::{Error, Result};

/// A buffered effect on one node: the successor, value, and tombstone state
/// the node will have if the transaction commits. Never applied in place
/// before commit.
pub(crate) struct PendingWrite<K, V> {
    pub(crate) next: NodeRef<K, V>,
    pub(crate) value: Option<V>,
    pub(crate) deleted: bool,
}

/// Per-thread transaction workspace.
///
/// Create one per worker thread and pass it to every list operation. A
/// session is not tied to a particular list until a transaction touches one,
/// and transactions never span lists.
pub struct TxSession<K, V> {
    pub(crate) active: bool,
    pub(crate) read_version: u64,
    pub(crate) read_only: bool,
    pub(crate) read_set: HashSet<NodeRef<K, V>>,
    pub(crate) write_set: HashMap<NodeRef<K, V>, PendingWrite<K, V>>,
    /// Nodes allocated by this attempt: published on commit, freed on abort.
    pub(crate) created: Vec<NodeRef<K, V>>,
    pub(crate) index_add: Vec<NodeRef<K, V>>,
    pub(crate) index_remove: Vec<NodeRef<K, V>>,
    /// Pin held for the whole attempt so every recorded node handle stays
    /// dereferenceable until the attempt ends.
    guard: Option<Guard>,
}

impl<K, V> TxSession<K, V> {
    /// Create an idle session (singleton mode).
    pub fn new() -> Self {
        TxSession {
            active: false,
            read_version: 0,
            read_only: true,
            read_set: HashSet::new(),
            write_set: HashMap::new(),
            created: Vec::new(),
            index_add: Vec::new(),
            index_remove: Vec::new(),
            guard: None,
        }
    }

    /// True while a transaction attempt is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Snapshot version captured at the start of the current attempt.
    pub fn read_version(&self) -> u64 {
        self.read_version
    }

    /// Start a transaction attempt at the given snapshot version.
    ///
    /// Normally invoked by the retry driver, not directly.
    pub(crate) fn begin(&mut self, read_version: u64) -> Result<()> {
        if self.active {
            return Err(Error::invalid_argument(
                "begin called on a session with an active transaction",
            ));
        }
        self.active = true;
        self.read_version = read_version;
        self.read_only = true;
        // clear() preserves capacity across retries
        self.read_set.clear();
        self.write_set.clear();
        self.created.clear();
        self.index_add.clear();
        self.index_remove.clear();
        self.guard = Some(epoch::pin());
        Ok(())
    }

    /// Record or merge a buffered effect for `node`.
    pub(crate) fn record_write(
        &mut self,
        node: NodeRef<K, V>,
        next: NodeRef<K, V>,
        value: Option<V>,
        deleted: bool,
    ) {
        self.write_set.insert(
            node,
            PendingWrite {
                next,
                value,
                deleted,
            },
        );
    }

    pub(crate) fn pending(&self, node: &NodeRef<K, V>) -> Option<&PendingWrite<K, V>> {
        self.write_set.get(node)
    }

    /// Number of buffered node effects (for diagnostics).
    pub fn pending_writes(&self) -> usize {
        self.write_set.len()
    }

    /// Number of nodes observed by the current attempt (for diagnostics).
    pub fn reads_tracked(&self) -> usize {
        self.read_set.len()
    }

    /// Discard the attempt: free nodes it allocated (they were never
    /// published, so no other thread can hold them) and drop the pin.
    pub(crate) fn rollback(&mut self) {
        for node in self.created.drain(..) {
            unsafe {
                drop(node.as_shared().into_owned());
            }
        }
        self.read_set.clear();
        self.write_set.clear();
        self.index_add.clear();
        self.index_remove.clear();
        self.active = false;
        self.read_only = true;
        self.guard = None;
    }

    /// Finish a committed attempt. Created nodes are now owned by the list,
    /// so they are not freed here.
    pub(crate) fn finish(&mut self) {
        self.created.clear();
        self.read_set.clear();
        self.write_set.clear();
        self.index_add.clear();
        self.index_remove.clear();
        self.active = false;
        self.read_only = true;
        self.guard = None;
    }
}

impl<K, V> Default for TxSession<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
