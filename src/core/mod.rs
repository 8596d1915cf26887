//! Simulation core: shared resource, workers, metrics, events and the
//! coordinator that ties them to one lock manager.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod metrics;
pub mod resource;
pub mod worker;

pub use coordinator::{AutoSpawner, Coordinator, Snapshot};
pub use error::{AppResult, SimulationError};
pub use events::{
    AbortReason, CallbackEventSink, ChannelEventSink, EventBus, EventKind, EventPayload,
    EventSink, InMemoryEventSink, LockEvent, TracingEventSink,
};
pub use metrics::Metrics;
pub use resource::{ResourceStats, SharedResource};
pub use worker::{WorkerHandle, WorkerOutcome, WorkerState};
