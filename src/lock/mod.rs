//! Readers-writers lock managers.
//!
//! Every strategy guards its bookkeeping with a single `parking_lot::Mutex`
//! and blocks waiters on `parking_lot::Condvar`s. They share one contract,
//! [`LockManager`], and one invariant: never a reader alongside a writer,
//! never two writers. What differs is the admission predicate and who gets
//! woken on release.
//!
//! # Example
//!
//! ```
//! use rw_arbiter::lock::{CancelToken, LockManager, ReaderPriorityLock};
//!
//! let lock = ReaderPriorityLock::new(None);
//! let cancel = CancelToken::new();
//!
//! let first = lock.start_read(1, &cancel).unwrap();
//! let second = lock.start_read(2, &cancel).unwrap();
//! assert_eq!(second.concurrent_readers, 2);
//! assert!(second.sequence > first.sequence);
//!
//! lock.end_read(1);
//! lock.end_read(2);
//! lock.start_write(3, &cancel).unwrap();
//! assert_eq!(lock.state().active_writer, Some(3));
//! lock.end_write(3);
//! ```

mod adaptive;
mod fair_fifo;
mod occupancy;
mod reader_priority;
mod writer_priority;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StrategyKind;

pub use adaptive::AdaptiveLock;
pub use fair_fifo::FairFifoLock;
pub use reader_priority::ReaderPriorityLock;
pub use writer_priority::WriterPriorityLock;

/// Worker identifier, unique for the lifetime of a coordinator.
pub type WorkerId = u64;

/// What a worker wants to do with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shared access.
    Reader,
    /// Exclusive access.
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => f.write_str("Reader"),
            Self::Writer => f.write_str("Writer"),
        }
    }
}

/// Cooperative cancellation flag shared between a worker and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Waiters only notice after
    /// [`LockManager::interrupt`] wakes them or they wake for another reason.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Successful admission into a critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Position in this lock's admission order, starting at 1.
    pub sequence: u64,
    /// Active readers right after this admission (0 for writers).
    pub concurrent_readers: usize,
}

/// Why `start_read`/`start_write` returned without admission.
///
/// In both cases the request has been fully withdrawn: no counter is left
/// incremented and no queue entry remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The caller's [`CancelToken`] was cancelled while waiting.
    #[error("admission cancelled")]
    Cancelled,
    /// The configured admission timeout elapsed.
    #[error("admission timed out after {0:?}")]
    TimedOut(Duration),
}

/// Point-in-time view of a lock's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// Strategy that produced this state.
    pub strategy: StrategyKind,
    /// Readers currently holding admission.
    pub active_readers: usize,
    /// Ids of the active readers, in admission order.
    pub active_reader_ids: Vec<WorkerId>,
    /// Writer currently holding admission.
    pub active_writer: Option<WorkerId>,
    /// Readers blocked in `start_read`.
    pub waiting_readers: usize,
    /// Writers blocked in `start_write`.
    pub waiting_writers: usize,
    /// Ids of waiting readers, in arrival order.
    pub waiting_reader_ids: Vec<WorkerId>,
    /// Ids of waiting writers, in arrival order.
    pub waiting_writer_ids: Vec<WorkerId>,
    /// Admissions granted so far.
    pub admissions: u64,
    /// Highest number of simultaneous readers, never below `active_readers`.
    pub max_concurrent_readers: usize,
}

impl LockState {
    /// Whether the mutual-exclusion invariant holds.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        !(self.active_readers > 0 && self.active_writer.is_some())
    }

    /// Whether nobody holds or waits for the lock.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active_readers == 0
            && self.active_writer.is_none()
            && self.waiting_readers == 0
            && self.waiting_writers == 0
    }
}

/// Shared contract of every admission strategy.
///
/// `start_*` may block; `end_*` never block. Calling `end_*` without a
/// matching successful `start_*` for the same id is a bug in the caller and
/// panics.
pub trait LockManager: Send + Sync + fmt::Debug {
    /// Strategy implemented by this manager.
    fn kind(&self) -> StrategyKind;

    /// Block until `id` may read, the token is cancelled, or the admission
    /// timeout elapses.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::Cancelled`] or [`AdmissionError::TimedOut`]; the
    /// request is withdrawn in both cases.
    fn start_read(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError>;

    /// Release read admission held by `id`.
    fn end_read(&self, id: WorkerId);

    /// Block until `id` may write, the token is cancelled, or the admission
    /// timeout elapses.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::Cancelled`] or [`AdmissionError::TimedOut`]; the
    /// request is withdrawn in both cases.
    fn start_write(&self, id: WorkerId, cancel: &CancelToken)
        -> Result<Admission, AdmissionError>;

    /// Release write admission held by `id`.
    fn end_write(&self, id: WorkerId);

    /// Copy of the current bookkeeping, taken under the internal lock.
    fn state(&self) -> LockState;

    /// Wake every waiter so it re-checks its cancel token.
    fn interrupt(&self);
}

/// Wait on `cvar` until `blocked` turns false.
///
/// The predicate is always evaluated with the guard held, so admission is
/// committed against state that cannot change underneath the caller. Returns
/// early if `cancel` fires or `deadline` passes while still blocked.
fn park<T, F>(
    cvar: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    cancel: &CancelToken,
    deadline: Option<(Instant, Duration)>,
    mut blocked: F,
) -> Result<(), AdmissionError>
where
    F: FnMut(&T) -> bool,
{
    loop {
        if !blocked(&**guard) {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }
        match deadline {
            None => cvar.wait(guard),
            Some((at, budget)) => {
                if Instant::now() >= at {
                    return Err(AdmissionError::TimedOut(budget));
                }
                let _ = cvar.wait_until(guard, at);
            }
        }
    }
}

fn deadline_from(timeout: Option<Duration>) -> Option<(Instant, Duration)> {
    timeout.map(|budget| (Instant::now() + budget, budget))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_admission_error_display() {
        assert_eq!(AdmissionError::Cancelled.to_string(), "admission cancelled");
        assert_eq!(
            AdmissionError::TimedOut(Duration::from_millis(5)).to_string(),
            "admission timed out after 5ms"
        );
    }

    #[test]
    fn test_park_returns_immediately_when_unblocked() {
        let mutex = parking_lot::Mutex::new(0_u32);
        let cvar = Condvar::new();
        let mut guard = mutex.lock();
        assert_eq!(park(&cvar, &mut guard, &CancelToken::new(), None, |_| false), Ok(()));
    }

    #[test]
    fn test_park_honours_deadline() {
        let mutex = parking_lot::Mutex::new(0_u32);
        let cvar = Condvar::new();
        let mut guard = mutex.lock();
        let deadline = deadline_from(Some(Duration::from_millis(20)));
        let started = Instant::now();
        let result = park(&cvar, &mut guard, &CancelToken::new(), deadline, |_| true);
        assert_eq!(result, Err(AdmissionError::TimedOut(Duration::from_millis(20))));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_park_reports_cancellation() {
        let mutex = parking_lot::Mutex::new(0_u32);
        let cvar = Condvar::new();
        let token = CancelToken::new();
        token.cancel();
        let mut guard = mutex.lock();
        assert_eq!(
            park(&cvar, &mut guard, &token, None, |_| true),
            Err(AdmissionError::Cancelled)
        );
    }
}
