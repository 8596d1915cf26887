//! The protected integer and its aggregate counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Shared integer guarded externally by a [`LockManager`].
///
/// Nothing here arbitrates access. Callers must hold read admission to call
/// [`Self::read`] and write admission to call [`Self::write`]; the atomics
/// only make the type shareable between threads and let observers take a
/// snapshot without touching the lock.
///
/// [`LockManager`]: crate::lock::LockManager
#[derive(Debug, Default)]
pub struct SharedResource {
    value: AtomicI64,
    total_reads: AtomicU64,
    total_writes: AtomicU64,
}

/// Counters copied out of a [`SharedResource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Current value.
    pub value: i64,
    /// Completed read sections.
    pub total_reads: u64,
    /// Applied writes.
    pub total_writes: u64,
}

impl SharedResource {
    /// Resource starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value. Requires read or write admission.
    #[must_use]
    pub fn read(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Add `delta` and return the new value. Requires write admission.
    pub fn write(&self, delta: i64) -> i64 {
        let new = self.value.fetch_add(delta, Ordering::AcqRel) + delta;
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        new
    }

    /// Count a finished read section.
    pub fn record_read(&self) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter.
    #[must_use]
    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            value: self.read(),
            total_reads: self.total_reads.load(Ordering::Relaxed),
            total_writes: self.total_writes.load(Ordering::Relaxed),
        }
    }
}
