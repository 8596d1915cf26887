//! Worker lifecycle events and the sinks that consume them.
//!
//! Every worker emits exactly one `Requested` event and exactly one terminal
//! event (`Released` or `Aborted`), with `Acquired` and, for writers,
//! `ValueChanged` in between. Events are numbered and dispatched under one
//! lock, so every sink sees them in the same order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lock::{Role, WorkerId};
use crate::util::clock::now_ms;

/// Lifecycle step a worker reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Worker asked for admission.
    Requested,
    /// Worker entered its critical section.
    Acquired,
    /// Worker left its critical section normally.
    Released,
    /// A writer changed the shared value.
    ValueChanged,
    /// Worker gave up or was stopped.
    Aborted,
}

impl EventKind {
    /// Whether this event ends a worker's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Aborted)
    }
}

/// Why a worker ended in the aborted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Stopped before admission was granted.
    CancelledWhileWaiting,
    /// The lock's admission timeout elapsed.
    TimedOut,
    /// Admission arrived after the stop request; released untouched.
    CancelledOnAdmission,
    /// Stopped during the hold; the lock was released first.
    StoppedWhileActive,
}

/// Event-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// No extra data.
    None,
    /// Admission details.
    Admitted {
        /// Position in the lock's admission order.
        sequence: u64,
        /// Time spent waiting for admission.
        waited: Duration,
        /// Value seen on entry.
        observed: i64,
    },
    /// Value before and after a write.
    Changed {
        /// Value before the write.
        old: i64,
        /// Value after the write.
        new: i64,
    },
    /// Abort cause.
    Aborted {
        /// What ended the worker.
        reason: AbortReason,
    },
}

/// One entry of the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    /// Dispatch order, starting at 1 for each coordinator.
    pub seq: u64,
    /// Run the event belongs to; changes on every reset.
    pub run_id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u128,
    /// Worker that emitted the event.
    pub worker_id: WorkerId,
    /// Role of that worker.
    pub role: Role,
    /// Lifecycle step.
    pub kind: EventKind,
    /// Step-specific data.
    pub payload: EventPayload,
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = format!("{} {}", self.role, self.worker_id);
        match (&self.kind, &self.payload, self.role) {
            (EventKind::Requested, _, _) => write!(f, "{who} waiting"),
            (
                EventKind::Acquired,
                EventPayload::Admitted {
                    waited, observed, ..
                },
                Role::Reader,
            ) => write!(
                f,
                "{who} reading data: {observed} (waited {:.2}s)",
                waited.as_secs_f64()
            ),
            (EventKind::Acquired, EventPayload::Admitted { waited, .. }, Role::Writer) => {
                write!(f, "{who} acquired (waited {:.2}s)", waited.as_secs_f64())
            }
            (EventKind::ValueChanged, EventPayload::Changed { old, new }, _) => {
                write!(f, "{who} writing: {old} -> {new}")
            }
            (EventKind::Released, _, _) => write!(f, "{who} finished"),
            (EventKind::Aborted, EventPayload::Aborted { reason }, _) => {
                write!(f, "{who} aborted ({reason:?})")
            }
            (kind, _, _) => write!(f, "{who} {kind:?}"),
        }
    }
}

/// Consumer of the event stream.
///
/// Sinks are called while the bus holds its dispatch lock; they must not
/// emit events themselves.
pub trait EventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &LockEvent);
}

/// Bounded in-memory history, oldest evicted first.
#[derive(Debug)]
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<LockEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Drop every stored event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: &LockEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Writes each event to `tracing` as a human-readable line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &LockEvent) {
        match event.kind {
            EventKind::Aborted => warn!(
                seq = event.seq,
                worker_id = event.worker_id,
                role = %event.role,
                "{event}"
            ),
            _ => info!(
                seq = event.seq,
                worker_id = event.worker_id,
                role = %event.role,
                kind = ?event.kind,
                "{event}"
            ),
        }
    }
}

/// Forwards events to a channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: Sender<LockEvent>,
}

impl ChannelEventSink {
    /// Sink sending into `tx`.
    #[must_use]
    pub const fn new(tx: Sender<LockEvent>) -> Self {
        Self { tx }
    }

    /// Send `event`; false once the receiving side is gone.
    fn forward(&self, event: &LockEvent) -> bool {
        self.tx.send(event.clone()).is_ok()
    }
}

impl EventSink for ChannelEventSink {
    fn record(&self, event: &LockEvent) {
        let _ = self.forward(event);
    }
}

/// Adapts a closure into a sink.
pub struct CallbackEventSink<F>(F);

impl<F> CallbackEventSink<F>
where
    F: Fn(&LockEvent) + Send + Sync,
{
    /// Sink invoking `callback` for every event.
    pub const fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> EventSink for CallbackEventSink<F>
where
    F: Fn(&LockEvent) + Send + Sync,
{
    fn record(&self, event: &LockEvent) {
        (self.0)(event);
    }
}

struct Dispatch {
    seq: u64,
    run_id: Uuid,
}

/// Numbers events and fans them out to every registered sink.
pub struct EventBus {
    dispatch: Mutex<Dispatch>,
    history: Arc<InMemoryEventSink>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    subscribers: Mutex<Vec<ChannelEventSink>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sinks.read().len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Bus keeping the last `history` events in memory.
    #[must_use]
    pub fn new(history: usize, run_id: Uuid) -> Self {
        Self {
            dispatch: Mutex::new(Dispatch { seq: 0, run_id }),
            history: Arc::new(InMemoryEventSink::new(history)),
            sinks: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register an additional sink.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Receiver of every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<LockEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(ChannelEventSink::new(tx));
        rx
    }

    /// Stored history, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<LockEvent> {
        self.history.events()
    }

    /// Start a new run: clear history and stamp later events with `run_id`.
    pub fn begin_run(&self, run_id: Uuid) {
        let mut dispatch = self.dispatch.lock();
        dispatch.run_id = run_id;
        self.history.clear();
    }

    /// Number, timestamp and deliver an event.
    pub fn emit(&self, worker_id: WorkerId, role: Role, kind: EventKind, payload: EventPayload) {
        let mut dispatch = self.dispatch.lock();
        dispatch.seq += 1;
        let event = LockEvent {
            seq: dispatch.seq,
            run_id: dispatch.run_id,
            timestamp_ms: now_ms(),
            worker_id,
            role,
            kind,
            payload,
        };
        self.history.record(&event);
        for sink in self.sinks.read().iter() {
            sink.record(&event);
        }
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.forward(&event));
    }
}
