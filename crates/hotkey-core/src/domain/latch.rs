//! Reference-counted boolean gates.
//!
//! A [`BlockLatch`] is busy while at least one [`LatchGuard`] rented from it
//! is alive.  Guards release themselves on drop, so the count can never go
//! negative and callers cannot forget a release on an early-return path.
//!
//! # Thread safety
//!
//! The counter is an `AtomicUsize`.  Guards are rented and dropped from
//! arbitrary threads (UI actions, the recorder, tests) while the input
//! consumer thread reads [`BlockLatch::is_busy`] on every event; no lock is
//! taken on either side.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

/// A named reference count; busy while `count > 0`.
pub struct BlockLatch {
    name: String,
    count: AtomicUsize,
}

impl BlockLatch {
    /// Creates an idle latch wrapped in an `Arc` (guards keep it alive).
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            count: AtomicUsize::new(0),
        })
    }

    /// Increments the count and returns the guard that will decrement it.
    pub fn rent(self: &Arc<Self>) -> LatchGuard {
        let previous = self.count.fetch_add(1, Ordering::AcqRel);
        trace!(latch = %self.name, count = previous + 1, "latch rented");
        LatchGuard {
            latch: Some(Arc::clone(self)),
        }
    }

    /// `true` while at least one guard is alive.
    pub fn is_busy(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    /// Number of live guards.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        // Saturating: a release can only ever follow its own rent.
        let result = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        match result {
            Ok(previous) => trace!(latch = %self.name, count = previous - 1, "latch released"),
            Err(_) => debug_assert!(false, "latch {} released below zero", self.name),
        }
    }
}

impl fmt::Debug for BlockLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockLatch")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

/// RAII handle returned by [`BlockLatch::rent`].
#[must_use = "dropping the guard releases the latch immediately"]
pub struct LatchGuard {
    latch: Option<Arc<BlockLatch>>,
}

impl LatchGuard {
    /// Releases the latch now.  Equivalent to dropping the guard.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// The latch this guard belongs to.
    pub fn latch(&self) -> Option<&Arc<BlockLatch>> {
        self.latch.as_ref()
    }

    fn release_inner(&mut self) {
        if let Some(latch) = self.latch.take() {
            latch.release();
        }
    }
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatchGuard")
            .field("latch", &self.latch.as_ref().map(|l| l.name()))
            .finish()
    }
}
