//! Wait-time and throughput accounting owned by the coordinator.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::lock::Role;

/// Bounded per-role wait samples plus a completion counter.
#[derive(Debug)]
pub struct Metrics {
    read_waits: VecDeque<Duration>,
    write_waits: VecDeque<Duration>,
    capacity: usize,
    completed: u64,
    started_at: Instant,
}

impl Metrics {
    /// Keep at most `capacity` samples per role, evicting the oldest.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            read_waits: VecDeque::with_capacity(capacity),
            write_waits: VecDeque::with_capacity(capacity),
            capacity,
            completed: 0,
            started_at: Instant::now(),
        }
    }

    fn samples_mut(&mut self, role: Role) -> &mut VecDeque<Duration> {
        match role {
            Role::Reader => &mut self.read_waits,
            Role::Writer => &mut self.write_waits,
        }
    }

    /// Samples currently retained for `role`, oldest first.
    #[must_use]
    pub const fn samples(&self, role: Role) -> &VecDeque<Duration> {
        match role {
            Role::Reader => &self.read_waits,
            Role::Writer => &self.write_waits,
        }
    }

    /// Record how long a worker waited for admission.
    pub fn record_wait(&mut self, role: Role, wait: Duration) {
        let capacity = self.capacity;
        let samples = self.samples_mut(role);
        if samples.len() >= capacity {
            samples.pop_front();
        }
        samples.push_back(wait);
    }

    /// Count one completed critical section.
    pub fn record_completion(&mut self) {
        self.completed += 1;
    }

    /// Completed critical sections since the run started.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Mean of the retained samples for `role`, zero when there are none.
    #[must_use]
    pub fn avg_wait(&self, role: Role) -> Duration {
        let samples = self.samples(role);
        if samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = samples.iter().sum();
        total / u32::try_from(samples.len()).unwrap_or(u32::MAX)
    }

    /// Completed critical sections per second since the run started.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        self.throughput_at(Instant::now())
    }

    fn throughput_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        if elapsed <= f64::EPSILON {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let completed = self.completed as f64;
        completed / elapsed
    }
}
