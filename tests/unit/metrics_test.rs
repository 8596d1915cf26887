//! Tests for metrics and the shared resource

use std::time::Duration;

use rw_arbiter::core::{Metrics, SharedResource};
use rw_arbiter::lock::Role;

#[test]
fn test_average_per_role() {
    let mut metrics = Metrics::new(10);
    metrics.record_wait(Role::Reader, Duration::from_millis(10));
    metrics.record_wait(Role::Reader, Duration::from_millis(30));
    metrics.record_wait(Role::Writer, Duration::from_millis(100));

    assert_eq!(metrics.avg_wait(Role::Reader), Duration::from_millis(20));
    assert_eq!(metrics.avg_wait(Role::Writer), Duration::from_millis(100));
}

#[test]
fn test_empty_average_is_zero() {
    let metrics = Metrics::new(10);
    assert_eq!(metrics.avg_wait(Role::Reader), Duration::ZERO);
    assert_eq!(metrics.avg_wait(Role::Writer), Duration::ZERO);
    assert_eq!(metrics.completed(), 0);
}

#[test]
fn test_history_is_bounded() {
    let mut metrics = Metrics::new(3);
    for ms in [1000, 10, 20, 30] {
        metrics.record_wait(Role::Writer, Duration::from_millis(ms));
    }
    let samples: Vec<_> = metrics.samples(Role::Writer).iter().copied().collect();
    assert_eq!(
        samples,
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30)
        ]
    );
    assert_eq!(metrics.avg_wait(Role::Writer), Duration::from_millis(20));
}

#[test]
fn test_throughput_counts_completions() {
    let mut metrics = Metrics::new(3);
    for _ in 0..5 {
        metrics.record_completion();
    }
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(metrics.completed(), 5);
    assert!(metrics.throughput() > 0.0);
}

#[test]
fn test_resource_stats() {
    let resource = SharedResource::new();
    assert_eq!(resource.write(1), 1);
    assert_eq!(resource.write(1), 2);
    resource.record_read();

    let stats = resource.stats();
    assert_eq!(stats.value, 2);
    assert_eq!(stats.total_writes, 2);
    assert_eq!(stats.total_reads, 1);
    assert_eq!(resource.read(), 2);
}
