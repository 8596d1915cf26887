//! Strict arrival-order admission.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::occupancy::Occupancy;
use super::{
    deadline_from, park, Admission, AdmissionError, CancelToken, LockManager, LockState, Role,
    WorkerId,
};
use crate::config::StrategyKind;

/// One queued request with its private wake-up channel.
#[derive(Debug)]
struct Ticket {
    id: WorkerId,
    role: Role,
    wake: Arc<Condvar>,
}

#[derive(Debug, Default)]
struct FifoState {
    occupancy: Occupancy,
    queue: VecDeque<Ticket>,
}

impl FifoState {
    fn is_head(&self, id: WorkerId) -> bool {
        self.queue.front().is_some_and(|t| t.id == id)
    }

    fn wake_head(&self) {
        if let Some(head) = self.queue.front() {
            head.wake.notify_one();
        }
    }

    /// Remove `id` from the queue and pop it; the entry must be at the head.
    fn pop_head(&mut self, id: WorkerId) {
        let popped = self.queue.pop_front();
        debug_assert_eq!(popped.map(|t| t.id), Some(id));
    }

    fn abandon(&mut self, id: WorkerId, role: Role) {
        self.queue.retain(|t| t.id != id);
        self.occupancy.withdraw(id, role);
        // The departure may have exposed a new head that can proceed now.
        self.wake_head();
    }
}

/// Admission strictly in request order regardless of role.
///
/// Each waiter sleeps on its own condition variable and only the queue head
/// is ever woken, so nobody is admitted out of order. A contiguous run of
/// readers at the head is admitted as a cascade: each admitted reader wakes
/// the next if it is also a reader. The price is reader concurrency: a queued
/// writer holds back every reader that arrived after it.
#[derive(Debug, Default)]
pub struct FairFifoLock {
    state: Mutex<FifoState>,
    timeout: Option<Duration>,
}

impl FairFifoLock {
    /// New idle lock. `timeout` bounds every admission wait when set.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    fn join_queue(state: &mut FifoState, id: WorkerId, role: Role) -> Arc<Condvar> {
        let wake = Arc::new(Condvar::new());
        state.queue.push_back(Ticket {
            id,
            role,
            wake: Arc::clone(&wake),
        });
        state.occupancy.enqueue(id, role);
        wake
    }
}

impl LockManager for FairFifoLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FairFifo
    }

    fn start_read(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        let wake = Self::join_queue(&mut state, id, Role::Reader);
        let deadline = deadline_from(self.timeout);
        let waited = park(&wake, &mut state, cancel, deadline, |s| {
            s.occupancy.has_writer() || !s.is_head(id)
        });
        if let Err(e) = waited {
            state.abandon(id, Role::Reader);
            return Err(e);
        }
        state.pop_head(id);
        let admission = state.occupancy.admit_reader(id);
        if state.queue.front().is_some_and(|t| t.role == Role::Reader) {
            state.wake_head();
        }
        Ok(admission)
    }

    fn end_read(&self, id: WorkerId) {
        let mut state = self.state.lock();
        if state.occupancy.release_reader(id) == 0 {
            state.wake_head();
        }
    }

    fn start_write(&self, id: WorkerId, cancel: &CancelToken) -> Result<Admission, AdmissionError> {
        let mut state = self.state.lock();
        let wake = Self::join_queue(&mut state, id, Role::Writer);
        let deadline = deadline_from(self.timeout);
        let waited = park(&wake, &mut state, cancel, deadline, |s| {
            s.occupancy.is_held() || !s.is_head(id)
        });
        if let Err(e) = waited {
            state.abandon(id, Role::Writer);
            return Err(e);
        }
        state.pop_head(id);
        Ok(state.occupancy.admit_writer(id))
    }

    fn end_write(&self, id: WorkerId) {
        let mut state = self.state.lock();
        state.occupancy.release_writer(id);
        state.wake_head();
    }

    fn state(&self) -> LockState {
        self.state.lock().occupancy.snapshot(self.kind())
    }

    fn interrupt(&self) {
        let state = self.state.lock();
        for ticket in &state.queue {
            ticket.wake.notify_all();
        }
    }
}
