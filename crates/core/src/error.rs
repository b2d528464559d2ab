//! Error types for the transactional list
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The abort signal is deliberately a *result variant*, not a panic: every
//! transactional list operation can return it, no singleton operation can,
//! and the retry driver matches on it explicitly.

use thiserror::Error;

/// Result type alias for list operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why an optimistic transaction attempt had to be thrown away.
///
/// Carried inside [`Error::TransactionAborted`] for diagnostics; the retry
/// driver treats every reason the same way (roll back, retry from scratch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A traversal encountered a node locked by a concurrent operation.
    LockedNode,
    /// A node's stamped version exceeds the transaction's snapshot version.
    VersionSkew,
    /// A non-transactional writer mutated a node at exactly the snapshot
    /// version, so the transaction cannot be ordered against it.
    SingletonInterference,
    /// Commit could not acquire a lock on a write-set node.
    CommitLockContention,
    /// Commit-time validation of the read-set failed.
    CommitValidation,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::LockedNode => "locked node encountered",
            AbortReason::VersionSkew => "version skew",
            AbortReason::SingletonInterference => "concurrent singleton mutation",
            AbortReason::CommitLockContention => "commit lock contention",
            AbortReason::CommitValidation => "commit validation failed",
        };
        f.write_str(s)
    }
}

/// Error types for the transactional list
#[derive(Debug, Error)]
pub enum Error {
    /// Caller contract violation (inverted range bounds, nested begin, ...).
    /// Not retried, surfaced immediately to the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic validation failed and the transaction attempt must be
    /// discarded. Always recovered locally by the retry driver; never
    /// surfaced to a caller running outside a transaction.
    #[error("transaction aborted: {0}")]
    TransactionAborted(AbortReason),

    /// `next()` was called on an iterator with no remaining element.
    #[error("iterator exhausted")]
    IteratorExhausted,

    /// A transactional entry point was used without an active transaction,
    /// or in a state that does not admit it.
    #[error("no active transaction: {0}")]
    InactiveSession(String),
}

impl Error {
    /// Shorthand for the abort signal.
    pub fn abort(reason: AbortReason) -> Self {
        Error::TransactionAborted(reason)
    }

    /// True if this error is the abort signal (and therefore retryable).
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::TransactionAborted(_))
    }

    /// Shorthand for invalid-argument errors.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
