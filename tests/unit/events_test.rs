//! Tests for the event bus and sinks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rw_arbiter::core::{
    AbortReason, CallbackEventSink, EventBus, EventKind, EventPayload, EventSink,
    InMemoryEventSink, LockEvent,
};
use rw_arbiter::lock::Role;
use uuid::Uuid;

fn event(worker_id: u64, role: Role, kind: EventKind, payload: EventPayload) -> LockEvent {
    LockEvent {
        seq: 1,
        run_id: Uuid::nil(),
        timestamp_ms: 0,
        worker_id,
        role,
        kind,
        payload,
    }
}

#[test]
fn test_display_lines() {
    let read = event(
        3,
        Role::Reader,
        EventKind::Acquired,
        EventPayload::Admitted {
            sequence: 1,
            waited: Duration::from_millis(200),
            observed: 5,
        },
    );
    assert_eq!(read.to_string(), "Reader 3 reading data: 5 (waited 0.20s)");

    let write = event(
        4,
        Role::Writer,
        EventKind::ValueChanged,
        EventPayload::Changed { old: 5, new: 6 },
    );
    assert_eq!(write.to_string(), "Writer 4 writing: 5 -> 6");

    let requested = event(9, Role::Writer, EventKind::Requested, EventPayload::None);
    assert_eq!(requested.to_string(), "Writer 9 waiting");
}

#[test]
fn test_terminal_kinds() {
    assert!(EventKind::Released.is_terminal());
    assert!(EventKind::Aborted.is_terminal());
    assert!(!EventKind::Requested.is_terminal());
    assert!(!EventKind::Acquired.is_terminal());
    assert!(!EventKind::ValueChanged.is_terminal());
}

#[test]
fn test_event_serializes_with_tagged_payload() {
    let aborted = event(
        2,
        Role::Reader,
        EventKind::Aborted,
        EventPayload::Aborted {
            reason: AbortReason::CancelledWhileWaiting,
        },
    );
    let json = serde_json::to_value(&aborted).unwrap();
    assert_eq!(json["kind"], "aborted");
    assert_eq!(json["role"], "reader");
    assert_eq!(json["payload"]["type"], "aborted");
    assert_eq!(json["payload"]["reason"], "cancelled_while_waiting");

    let back: LockEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, aborted);
}

#[test]
fn test_in_memory_sink_is_bounded() {
    let sink = InMemoryEventSink::new(2);
    for id in 1..=3 {
        sink.record(&event(id, Role::Reader, EventKind::Requested, EventPayload::None));
    }
    let ids: Vec<_> = sink.events().iter().map(|e| e.worker_id).collect();
    assert_eq!(ids, vec![2, 3]);
    sink.clear();
    assert!(sink.events().is_empty());
}

#[test]
fn test_bus_numbers_and_fans_out() {
    let run = Uuid::new_v4();
    let bus = EventBus::new(10, run);
    let rx = bus.subscribe();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.add_sink(Arc::new(CallbackEventSink::new(move |_: &LockEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    bus.emit(1, Role::Writer, EventKind::Requested, EventPayload::None);
    bus.emit(1, Role::Writer, EventKind::Released, EventPayload::None);

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
    assert!(received.iter().all(|e| e.run_id == run));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(bus.recent(), received);
}

#[test]
fn test_begin_run_clears_history_and_restamps() {
    let bus = EventBus::new(10, Uuid::new_v4());
    bus.emit(1, Role::Reader, EventKind::Requested, EventPayload::None);

    let next = Uuid::new_v4();
    bus.begin_run(next);
    assert!(bus.recent().is_empty());

    bus.emit(2, Role::Reader, EventKind::Requested, EventPayload::None);
    let recent = bus.recent();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].run_id, next);
    assert_eq!(recent[0].seq, 2);
}

#[test]
fn test_dropped_subscriber_is_pruned() {
    let bus = EventBus::new(10, Uuid::nil());
    let rx = bus.subscribe();
    drop(rx);
    bus.emit(1, Role::Reader, EventKind::Requested, EventPayload::None);
    let kept = bus.subscribe();
    bus.emit(1, Role::Reader, EventKind::Released, EventPayload::None);
    assert_eq!(kept.try_iter().count(), 1);
}
