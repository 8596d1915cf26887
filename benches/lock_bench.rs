//! Benchmarks for the lock managers.
//!
//! Benchmarks cover:
//! - Uncontended read and write admission per strategy
//! - Contended mixed load across threads per strategy
//! - Event bus dispatch

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use rw_arbiter::builders::build_lock_manager;
use rw_arbiter::config::{LockConfig, StrategyKind};
use rw_arbiter::core::{EventBus, EventKind, EventPayload};
use rw_arbiter::lock::{CancelToken, LockManager, Role};
use uuid::Uuid;

fn lock_for(kind: StrategyKind) -> Arc<dyn LockManager> {
    build_lock_manager(&LockConfig::for_strategy(kind)).unwrap()
}

// ============================================================================
// Uncontended Admission
// ============================================================================

fn bench_uncontended_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_read");
    for kind in StrategyKind::ALL {
        let lock = lock_for(kind);
        let cancel = CancelToken::new();
        group.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| {
                let admission = lock.start_read(1, &cancel).unwrap();
                lock.end_read(1);
                black_box(admission)
            });
        });
    }
    group.finish();
}

fn bench_uncontended_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_write");
    for kind in StrategyKind::ALL {
        let lock = lock_for(kind);
        let cancel = CancelToken::new();
        group.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| {
                let admission = lock.start_write(1, &cancel).unwrap();
                lock.end_write(1);
                black_box(admission)
            });
        });
    }
    group.finish();
}

// ============================================================================
// Contended Mixed Load
// ============================================================================

fn run_mixed(lock: &Arc<dyn LockManager>, threads: u64, ops: u64) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let lock = Arc::clone(lock);
            thread::spawn(move || {
                let cancel = CancelToken::new();
                for op in 0..ops {
                    let id = t * ops + op + 1;
                    // One write in four.
                    if op % 4 == 0 {
                        lock.start_write(id, &cancel).unwrap();
                        lock.end_write(id);
                    } else {
                        lock.start_read(id, &cancel).unwrap();
                        lock.end_read(id);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_contended_mixed(c: &mut Criterion) {
    const THREADS: u64 = 4;
    const OPS: u64 = 250;
    let mut group = c.benchmark_group("contended_mixed");
    group.throughput(Throughput::Elements(THREADS * OPS));
    group.sample_size(20);
    for kind in StrategyKind::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| {
                let lock = lock_for(kind);
                run_mixed(&lock, THREADS, OPS);
                black_box(lock.state().admissions)
            });
        });
    }
    group.finish();
}

// ============================================================================
// Event Dispatch
// ============================================================================

fn bench_event_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_emit");
    for subscribers in [0_usize, 1, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                let bus = EventBus::new(200, Uuid::new_v4());
                let receivers: Vec<_> = (0..subscribers).map(|_| bus.subscribe()).collect();
                b.iter(|| {
                    bus.emit(1, Role::Reader, EventKind::Requested, EventPayload::None);
                    for rx in &receivers {
                        black_box(rx.try_recv().ok());
                    }
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    admission_benches,
    bench_uncontended_read,
    bench_uncontended_write
);

criterion_group!(contention_benches, bench_contended_mixed);

criterion_group!(event_benches, bench_event_emit);

criterion_main!(admission_benches, contention_benches, event_benches);
