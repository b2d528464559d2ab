//! Software transactional memory engine for an ordered key-value list.
//!
//! The list supports two execution modes over the same data. Singleton
//! operations run immediately with fine-grained optimistic locking and never
//! abort. Transactional operations buffer their effects in a [`TxSession`]
//! and publish them atomically at commit, retried by the
//! [`TransactionRunner`] on interference. A per-list [`VersionClock`] orders
//! commits; a predecessor index keeps traversals short.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod iter;
pub mod list;
pub mod runner;
pub mod session;

mod index;
mod node;

pub use clock::VersionClock;
pub use iter::RangeIter;
pub use list::OrderedList;
pub use runner::TransactionRunner;
pub use session::TxSession;
