//! Global logical clock
//!
//! The clock is the sole source of truth for "when" a mutation happened.
//! Every committed transaction advances it exactly once; singleton mutations
//! stamp the current reading and defer the advance to the first transaction
//! that detects the interference.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing version counter.
///
/// Versions are strictly increasing and never reused. One clock serves one
/// [`OrderedList`](crate::list::OrderedList); transactions never span lists.
#[derive(Debug)]
pub struct VersionClock {
    counter: AtomicU64,
}

impl VersionClock {
    /// Create a clock starting at version 0.
    pub fn new() -> Self {
        VersionClock {
            counter: AtomicU64::new(0),
        }
    }

    /// Current version, without advancing.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Atomically advance the clock and return the new version.
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}
