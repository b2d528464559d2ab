//! txlist - transactional ordered list
//!
//! An ordered key-value map backed by a linked list with software
//! transactional memory. Operations run in one of two modes:
//!
//! - **Singleton**: called outside a transaction, executed immediately with
//!   fine-grained optimistic locking. Never aborts.
//! - **Transactional**: called inside a transaction, buffered in a session
//!   and published atomically at commit. Aborts on interference and is
//!   retried by the runner.
//!
//! # Quick Start
//!
//! ```
//! use txlist::{OrderedList, TxSession};
//!
//! let list: OrderedList<i64, String> = OrderedList::new();
//! let mut session = TxSession::new();
//!
//! // Singleton mode: immediate, never aborts
//! list.put(&mut session, 1, "one".into())?;
//!
//! // Transactional mode: atomic multi-key update
//! list.runner().run(&mut session, |list, session| {
//!     let moved = list.remove(session, &1)?;
//!     list.put(session, 2, moved.unwrap_or_default())?;
//!     Ok(())
//! })?;
//!
//! assert_eq!(list.get(&mut session, &2)?, Some("one".into()));
//! # Ok::<(), txlist::Error>(())
//! ```
//!
//! The engine internals (node layout, predecessor index) are not exposed;
//! the list, session, iterator, and runner make up the public API.

pub use txlist_core::{AbortReason, Error, Result};
pub use txlist_stm::{OrderedList, RangeIter, TransactionRunner, TxSession, VersionClock};
