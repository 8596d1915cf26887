//! Readers-always-win admission.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::occupancy::Occupancy;
use super::{
    deadline_from, park, Admission, AdmissionError, CancelToken, LockManager, LockState, Role,
    WorkerId,
};
use crate::config::StrategyKind;

/// Baseline policy: a reader only waits for an active writer, never for a
/// waiting one. A steady stream of readers starves writers indefinitely.
#[derive(Debug, Default)]
pub struct ReaderPriorityLock {
    state: Mutex<Occupancy>,
    changed: Condvar,
    timeout: Option<Duration>,
}

impl ReaderPriorityLock {
    /// New idle lock. `timeout` bounds every admission wait when set.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl LockManager for ReaderPriorityLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReaderPriority
    }

    fn start_read(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        state.enqueue(id, Role::Reader);
        let deadline = deadline_from(self.timeout);
        if let Err(e) = park(&self.changed, &mut state, cancel, deadline, Occupancy::has_writer) {
            state.withdraw(id, Role::Reader);
            return Err(e);
        }
        Ok(state.admit_reader(id))
    }

    fn end_read(&self, id: WorkerId) {
        let mut state = self.state.lock();
        if state.release_reader(id) == 0 {
            self.changed.notify_all();
        }
    }

    fn start_write(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        state.enqueue(id, Role::Writer);
        let deadline = deadline_from(self.timeout);
        if let Err(e) = park(&self.changed, &mut state, cancel, deadline, Occupancy::is_held) {
            state.withdraw(id, Role::Writer);
            return Err(e);
        }
        Ok(state.admit_writer(id))
    }

    fn end_write(&self, id: WorkerId) {
        self.state.lock().release_writer(id);
        self.changed.notify_all();
    }

    fn state(&self) -> LockState {
        self.state.lock().snapshot(self.kind())
    }

    fn interrupt(&self) {
        let _state = self.state.lock();
        self.changed.notify_all();
    }
}
