//! Writers-first admission.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::occupancy::Occupancy;
use super::{
    deadline_from, park, Admission, AdmissionError, CancelToken, LockManager, LockState, Role,
    WorkerId,
};
use crate::config::StrategyKind;

/// A reader waits while any writer is active or merely queued. The writer is
/// registered as waiting before it evaluates its own predicate and stays
/// registered until admitted, so its arrival alone freezes new readers.
/// Readers can starve under a steady stream of writers.
#[derive(Debug, Default)]
pub struct WriterPriorityLock {
    state: Mutex<Occupancy>,
    changed: Condvar,
    timeout: Option<Duration>,
}

impl WriterPriorityLock {
    /// New idle lock. `timeout` bounds every admission wait when set.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

fn reader_blocked(state: &Occupancy) -> bool {
    state.has_writer() || state.has_waiting_writers()
}

impl LockManager for WriterPriorityLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WriterPriority
    }

    fn start_read(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        state.enqueue(id, Role::Reader);
        let deadline = deadline_from(self.timeout);
        if let Err(e) = park(&self.changed, &mut state, cancel, deadline, reader_blocked) {
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
            // Readers held back by this writer may now proceed.
            self.changed.notify_all();
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
