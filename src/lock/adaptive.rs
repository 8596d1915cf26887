//! Reader priority with writer aging.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::occupancy::Occupancy;
use super::{
    deadline_from, park, Admission, AdmissionError, CancelToken, LockManager, LockState, Role,
    WorkerId,
};
use crate::config::StrategyKind;

#[derive(Debug, Default)]
struct AgingState {
    occupancy: Occupancy,
    writer_arrivals: HashMap<WorkerId, Instant>,
}

impl AgingState {
    /// Some waiting writer has been queued longer than `threshold`.
    fn starving(&self, threshold: Duration) -> bool {
        self.writer_arrivals
            .values()
            .any(|arrived| arrived.elapsed() > threshold)
    }
}

/// Reader priority until a waiting writer ages past the starvation
/// threshold. From then on new readers are frozen exactly as under writer
/// priority, and the freeze lifts by itself once the aged writer is admitted.
///
/// Age is evaluated whenever a reader checks its admission predicate, so the
/// bound on writer wait is practical rather than formal.
#[derive(Debug)]
pub struct AdaptiveLock {
    state: Mutex<AgingState>,
    changed: Condvar,
    threshold: Duration,
    timeout: Option<Duration>,
}

impl AdaptiveLock {
    /// New idle lock that starts freezing readers once a writer has waited
    /// longer than `threshold`.
    #[must_use]
    pub fn new(threshold: Duration, timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(AgingState::default()),
            changed: Condvar::new(),
            threshold,
            timeout,
        }
    }

    /// Configured starvation threshold.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether a waiting writer is currently past the threshold.
    #[must_use]
    pub fn is_starving(&self) -> bool {
        self.state.lock().starving(self.threshold)
    }
}

impl Default for AdaptiveLock {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), None)
    }
}

impl LockManager for AdaptiveLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Adaptive
    }

    fn start_read(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        state.occupancy.enqueue(id, Role::Reader);
        let deadline = deadline_from(self.timeout);
        let threshold = self.threshold;
        let mut frozen = false;
        let waited = park(&self.changed, &mut state, cancel, deadline, |s| {
            let starving = s.occupancy.has_waiting_writers() && s.starving(threshold);
            frozen |= starving;
            s.occupancy.has_writer() || starving
        });
        if frozen {
            debug!(worker_id = id, "reader held back by a starving writer");
        }
        if let Err(e) = waited {
            state.occupancy.withdraw(id, Role::Reader);
            return Err(e);
        }
        Ok(state.occupancy.admit_reader(id))
    }

    fn end_read(&self, id: WorkerId) {
        let mut state = self.state.lock();
        if state.occupancy.release_reader(id) == 0 {
            self.changed.notify_all();
        }
    }

    fn start_write(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        state.occupancy.enqueue(id, Role::Writer);
        state.writer_arrivals.insert(id, Instant::now());
        let deadline = deadline_from(self.timeout);
        let waited = park(&self.changed, &mut state, cancel, deadline, |s| {
            s.occupancy.is_held()
        });
        state.writer_arrivals.remove(&id);
        if let Err(e) = waited {
            state.occupancy.withdraw(id, Role::Writer);
            self.changed.notify_all();
            return Err(e);
        }
        Ok(state.occupancy.admit_writer(id))
    }

    fn end_write(&self, id: WorkerId) {
        self.state.lock().occupancy.release_writer(id);
        self.changed.notify_all();
    }

    fn state(&self) -> LockState {
        self.state.lock().occupancy.snapshot(self.kind())
    }

    fn interrupt(&self) {
        let _state = self.state.lock();
        self.changed.notify_all();
    }
}
