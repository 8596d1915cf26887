//! Simulated reader and writer tasks.
//!
//! Each worker runs on its own OS thread:
//!
//! ```text
//! waiting --admission--> active --release--> finished
//!    |                      |
//!    +------- stop ---------+--> aborted
//! ```
//!
//! Stopping is cooperative. The cancel token is threaded through the blocking
//! `start_*` call, so a waiting worker withdraws as soon as it is interrupted.
//! An active worker checks the token between hold slices and always releases
//! the lock before it terminates.
//!
//! Event order per worker is `Requested`, then `Acquired` (plus
//! `ValueChanged` for writers), then one terminal `Released` or `Aborted`.
//! The terminal event of a worker that held the lock precedes the next
//! holder's `Acquired`. `Requested` is emitted just before the worker joins
//! the lock's queue, so across workers the admission `sequence` in the
//! `Acquired` payload, not `Requested` order, is the authoritative order.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::events::{AbortReason, EventBus, EventKind, EventPayload};
use crate::core::metrics::Metrics;
use crate::core::resource::SharedResource;
use crate::lock::{AdmissionError, CancelToken, LockManager, Role, WorkerId};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Requested admission, not yet granted.
    Waiting,
    /// Inside the critical section.
    Active,
    /// Released the lock after a full hold.
    Finished,
    /// Stopped or timed out.
    Aborted,
}

impl WorkerState {
    /// Whether the worker has terminated.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Completed its hold and released.
    Finished {
        /// Time spent waiting for admission.
        waited: Duration,
        /// Value read, or value written.
        value: i64,
    },
    /// Terminated early.
    Aborted(AbortReason),
}

/// Everything a worker touches, all belonging to one run.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub lock: Arc<dyn LockManager>,
    pub resource: Arc<SharedResource>,
    pub metrics: Arc<Mutex<Metrics>>,
    pub events: Arc<EventBus>,
}

/// Static description of a worker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSpec {
    pub id: WorkerId,
    pub role: Role,
    pub hold: Duration,
    pub slices: u32,
}

/// Owning handle to a running worker thread.
pub struct WorkerHandle {
    id: WorkerId,
    role: Role,
    state: Arc<Mutex<WorkerState>>,
    cancel: CancelToken,
    lock: Arc<dyn LockManager>,
    thread: Option<JoinHandle<WorkerOutcome>>,
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl WorkerHandle {
    /// Worker id.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Worker role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Whether the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the worker to stop and wake it if it is blocked on the lock.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.lock.interrupt();
    }

    /// Wait for the thread to exit. Returns `None` if it was already joined
    /// or it panicked.
    pub fn join(&mut self) -> Option<WorkerOutcome> {
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                warn!(worker_id = self.id, "worker thread panicked");
                None
            }
        }
    }
}

/// Start a worker thread for `spec` against `ctx`.
pub(crate) fn spawn(spec: WorkerSpec, ctx: WorkerContext) -> std::io::Result<WorkerHandle> {
    let state = Arc::new(Mutex::new(WorkerState::Waiting));
    let cancel = CancelToken::new();
    let lock = Arc::clone(&ctx.lock);

    let thread = {
        let state = Arc::clone(&state);
        let cancel = cancel.clone();
        let name = match spec.role {
            Role::Reader => format!("rw-reader-{}", spec.id),
            Role::Writer => format!("rw-writer-{}", spec.id),
        };
        thread::Builder::new()
            .name(name)
            .spawn(move || run(spec, &ctx, &state, &cancel))?
    };

    Ok(WorkerHandle {
        id: spec.id,
        role: spec.role,
        state,
        cancel,
        lock,
        thread: Some(thread),
    })
}

fn run(
    spec: WorkerSpec,
    ctx: &WorkerContext,
    state: &Mutex<WorkerState>,
    cancel: &CancelToken,
) -> WorkerOutcome {
    let WorkerSpec { id, role, .. } = spec;
    ctx.events
        .emit(id, role, EventKind::Requested, EventPayload::None);
    let wait_start = Instant::now();

    let admitted = match role {
        Role::Reader => ctx.lock.start_read(id, cancel),
        Role::Writer => ctx.lock.start_write(id, cancel),
    };
    let admission = match admitted {
        Ok(admission) => admission,
        Err(e) => {
            let reason = match e {
                AdmissionError::Cancelled => AbortReason::CancelledWhileWaiting,
                AdmissionError::TimedOut(_) => AbortReason::TimedOut,
            };
            debug!(worker_id = id, error = %e, "admission failed");
            return settle(state, abort(spec, ctx, reason));
        }
    };

    // From here on the terminal event is emitted before the lock is released,
    // so it is always numbered ahead of the next holder's `Acquired`.
    if cancel.is_cancelled() {
        let outcome = abort(spec, ctx, AbortReason::CancelledOnAdmission);
        release(spec, ctx);
        return settle(state, outcome);
    }

    let waited = wait_start.elapsed();
    *state.lock() = WorkerState::Active;
    ctx.metrics.lock().record_wait(role, waited);
    let value = enter(spec, ctx, admission.sequence, waited);

    let outcome = if hold(spec, cancel) {
        if role == Role::Reader {
            ctx.resource.record_read();
        }
        ctx.metrics.lock().record_completion();
        ctx.events
            .emit(id, role, EventKind::Released, EventPayload::None);
        WorkerOutcome::Finished { waited, value }
    } else {
        abort(spec, ctx, AbortReason::StoppedWhileActive)
    };
    release(spec, ctx);
    settle(state, outcome)
}

/// Critical-section entry work. Returns the value read or written.
fn enter(spec: WorkerSpec, ctx: &WorkerContext, sequence: u64, waited: Duration) -> i64 {
    let observed = ctx.resource.read();
    let admitted = EventPayload::Admitted {
        sequence,
        waited,
        observed,
    };
    ctx.events
        .emit(spec.id, spec.role, EventKind::Acquired, admitted);
    match spec.role {
        Role::Reader => observed,
        Role::Writer => {
            let new = ctx.resource.write(1);
            ctx.events.emit(
                spec.id,
                spec.role,
                EventKind::ValueChanged,
                EventPayload::Changed { old: observed, new },
            );
            new
        }
    }
}

/// Sleep through the hold in slices. Returns false if stopped part-way.
fn hold(spec: WorkerSpec, cancel: &CancelToken) -> bool {
    let slices = spec.slices.max(1);
    let slice = spec.hold / slices;
    for _ in 0..slices {
        if cancel.is_cancelled() {
            return false;
        }
        thread::sleep(slice);
    }
    !cancel.is_cancelled()
}

fn release(spec: WorkerSpec, ctx: &WorkerContext) {
    match spec.role {
        Role::Reader => ctx.lock.end_read(spec.id),
        Role::Writer => ctx.lock.end_write(spec.id),
    }
}

fn abort(spec: WorkerSpec, ctx: &WorkerContext, reason: AbortReason) -> WorkerOutcome {
    ctx.events.emit(
        spec.id,
        spec.role,
        EventKind::Aborted,
        EventPayload::Aborted { reason },
    );
    WorkerOutcome::Aborted(reason)
}

/// Publish the terminal state once the lock is no longer held.
fn settle(state: &Mutex<WorkerState>, outcome: WorkerOutcome) -> WorkerOutcome {
    *state.lock() = match outcome {
        WorkerOutcome::Finished { .. } => WorkerState::Finished,
        WorkerOutcome::Aborted(_) => WorkerState::Aborted,
    };
    outcome
}
