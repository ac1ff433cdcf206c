//! Nullable clock: deterministic time for testing.

use seal_types::{Clock, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to.
#[derive(Debug)]
pub struct NullClock {
    current_millis: AtomicU64,
}

impl NullClock {
    pub fn new(initial_millis: u64) -> Self {
        Self {
            current_millis: AtomicU64::new(initial_millis),
        }
    }

    /// Advance time by a number of milliseconds.
    pub fn advance(&self, millis: u64) {
        self.current_millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, millis: u64) {
        self.current_millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.current_millis.load(Ordering::SeqCst))
    }
}
