//! Counters and id lists shared by every strategy.

use tracing::debug;

use super::{Admission, LockState, Role, WorkerId};
use crate::config::StrategyKind;

/// Who holds and who waits for the lock. Always accessed under the owning
/// strategy's mutex.
#[derive(Debug, Default)]
pub(super) struct Occupancy {
    pub active_readers: Vec<WorkerId>,
    pub active_writer: Option<WorkerId>,
    pub waiting_readers: Vec<WorkerId>,
    pub waiting_writers: Vec<WorkerId>,
    admissions: u64,
    max_readers: usize,
}

impl Occupancy {
    pub fn has_readers(&self) -> bool {
        !self.active_readers.is_empty()
    }

    pub const fn has_writer(&self) -> bool {
        self.active_writer.is_some()
    }

    pub fn has_waiting_writers(&self) -> bool {
        !self.waiting_writers.is_empty()
    }

    /// Readers or a writer hold the lock.
    pub fn is_held(&self) -> bool {
        self.has_readers() || self.has_writer()
    }

    pub fn enqueue(&mut self, id: WorkerId, role: Role) {
        match role {
            Role::Reader => self.waiting_readers.push(id),
            Role::Writer => self.waiting_writers.push(id),
        }
    }

    /// Drop a waiting registration that will never be admitted.
    pub fn withdraw(&mut self, id: WorkerId, role: Role) {
        let list = match role {
            Role::Reader => &mut self.waiting_readers,
            Role::Writer => &mut self.waiting_writers,
        };
        remove_id(list, id);
        debug!(worker_id = id, role = %role, "admission request withdrawn");
    }

    pub fn admit_reader(&mut self, id: WorkerId) -> Admission {
        debug_assert!(!self.has_writer(), "reader admitted while a writer is active");
        remove_id(&mut self.waiting_readers, id);
        self.active_readers.push(id);
        self.admissions += 1;
        self.max_readers = self.max_readers.max(self.active_readers.len());
        debug!(
            worker_id = id,
            readers = self.active_readers.len(),
            "read admission granted"
        );
        Admission {
            sequence: self.admissions,
            concurrent_readers: self.active_readers.len(),
        }
    }

    pub fn admit_writer(&mut self, id: WorkerId) -> Admission {
        debug_assert!(!self.is_held(), "writer admitted while the lock is held");
        remove_id(&mut self.waiting_writers, id);
        self.active_writer = Some(id);
        self.admissions += 1;
        debug!(worker_id = id, "write admission granted");
        Admission {
            sequence: self.admissions,
            concurrent_readers: 0,
        }
    }

    /// Returns the number of readers still active.
    pub fn release_reader(&mut self, id: WorkerId) -> usize {
        assert!(
            remove_id(&mut self.active_readers, id),
            "end_read called for worker {id} without a matching start_read"
        );
        self.active_readers.len()
    }

    pub fn release_writer(&mut self, id: WorkerId) {
        assert!(
            self.active_writer == Some(id),
            "end_write called for worker {id} but the active writer is {:?}",
            self.active_writer
        );
        self.active_writer = None;
    }

    pub fn snapshot(&self, strategy: StrategyKind) -> LockState {
        LockState {
            strategy,
            active_readers: self.active_readers.len(),
            active_reader_ids: self.active_readers.clone(),
            active_writer: self.active_writer,
            waiting_readers: self.waiting_readers.len(),
            waiting_writers: self.waiting_writers.len(),
            waiting_reader_ids: self.waiting_readers.clone(),
            waiting_writer_ids: self.waiting_writers.clone(),
            admissions: self.admissions,
            max_concurrent_readers: self.max_readers,
        }
    }
}

fn remove_id(list: &mut Vec<WorkerId>, id: WorkerId) -> bool {
    list.iter()
        .position(|&x| x == id)
        .map(|pos| list.remove(pos))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_sequence_increments() {
        let mut occ = Occupancy::default();
        occ.enqueue(1, Role::Reader);
        occ.enqueue(2, Role::Reader);
        let a = occ.admit_reader(1);
        let b = occ.admit_reader(2);
        assert_eq!((a.sequence, a.concurrent_readers), (1, 1));
        assert_eq!((b.sequence, b.concurrent_readers), (2, 2));
        assert!(occ.waiting_readers.is_empty());
    }

    #[test]
    fn test_max_readers_covers_every_snapshot() {
        let mut occ = Occupancy::default();
        occ.admit_reader(1);
        occ.admit_reader(2);
        let state = occ.snapshot(StrategyKind::FairFifo);
        assert_eq!(state.max_concurrent_readers, 2);

        occ.release_reader(1);
        occ.release_reader(2);
        occ.admit_reader(3);
        let state = occ.snapshot(StrategyKind::FairFifo);
        assert_eq!(state.active_readers, 1);
        assert_eq!(state.max_concurrent_readers, 2);
    }

    #[test]
    fn test_release_counts_remaining_readers() {
        let mut occ = Occupancy::default();
        occ.admit_reader(1);
        occ.admit_reader(2);
        assert_eq!(occ.release_reader(1), 1);
        assert_eq!(occ.release_reader(2), 0);
        assert!(!occ.is_held());
    }

    #[test]
    fn test_withdraw_removes_only_that_worker() {
        let mut occ = Occupancy::default();
        occ.enqueue(1, Role::Writer);
        occ.enqueue(2, Role::Writer);
        occ.withdraw(1, Role::Writer);
        assert_eq!(occ.waiting_writers, vec![2]);
        assert!(occ.has_waiting_writers());
    }

    #[test]
    #[should_panic(expected = "without a matching start_read")]
    fn test_unmatched_end_read_panics() {
        let mut occ = Occupancy::default();
        occ.release_reader(9);
    }

    #[test]
    #[should_panic(expected = "end_write called for worker 4")]
    fn test_unmatched_end_write_panics() {
        let mut occ = Occupancy::default();
        occ.admit_writer(3);
        occ.release_writer(4);
    }
}
