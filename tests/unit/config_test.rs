//! Tests for configuration validation and loading

use std::time::Duration;

use rw_arbiter::config::{
    AutoSpawnConfig, HoldRange, LockConfig, SimulationConfig, StrategyKind, WorkerConfig,
};

#[test]
fn test_defaults_are_valid() {
    let cfg = SimulationConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.lock.strategy, StrategyKind::ReaderPriority);
    assert_eq!(cfg.lock.starvation_threshold(), Duration::from_secs(2));
    assert_eq!(cfg.workers.reader_hold, HoldRange::new(500, 2_000));
    assert_eq!(cfg.workers.writer_hold, HoldRange::new(1_000, 3_000));
    assert_eq!(cfg.auto_spawn.interval(), Duration::from_secs(1));
}

#[test]
fn test_lock_config_invalid_threshold() {
    let invalid = LockConfig {
        starvation_threshold_ms: 0,
        ..LockConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_lock_config_invalid_timeout() {
    let invalid = LockConfig {
        admission_timeout_ms: Some(0),
        ..LockConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_config_inverted_range() {
    let invalid = WorkerConfig {
        reader_hold: HoldRange::new(50, 10),
        ..WorkerConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("reader_hold"));
}

#[test]
fn test_auto_spawn_probability_out_of_range() {
    let invalid = AutoSpawnConfig {
        writer_probability: 1.5,
        ..AutoSpawnConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_simulation_config_zero_history() {
    let invalid = SimulationConfig {
        event_history: 0,
        ..SimulationConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_json_with_partial_fields() {
    let cfg = SimulationConfig::from_json_str(
        r#"{ "lock": { "strategy": "fair_fifo", "admission_timeout_ms": 500 },
             "workers": { "hold_slices": 4 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.lock.strategy, StrategyKind::FairFifo);
    assert_eq!(cfg.lock.admission_timeout(), Some(Duration::from_millis(500)));
    assert_eq!(cfg.lock.starvation_threshold_ms, 2_000);
    assert_eq!(cfg.workers.hold_slices, 4);
    assert_eq!(cfg.wait_history, 100);
}

#[test]
fn test_json_rejects_unknown_strategy() {
    let err = SimulationConfig::from_json_str(r#"{ "lock": { "strategy": "lottery" } }"#)
        .unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_lookup_overrides_every_variable() {
    let cfg = SimulationConfig::from_lookup(|key| {
        let value = match key {
            "RWSIM_STRATEGY" => "Writer-Priority",
            "RWSIM_STARVATION_THRESHOLD_MS" => "750",
            "RWSIM_ADMISSION_TIMEOUT_MS" => " 1200 ",
            "RWSIM_AUTO_SPAWN_INTERVAL_MS" => "250",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap();
    assert_eq!(cfg.lock.strategy, StrategyKind::WriterPriority);
    assert_eq!(cfg.lock.starvation_threshold_ms, 750);
    assert_eq!(cfg.lock.admission_timeout_ms, Some(1_200));
    assert_eq!(cfg.auto_spawn.interval_ms, 250);
}

#[test]
fn test_lookup_rejects_unknown_strategy() {
    let result = SimulationConfig::from_lookup(|key| {
        (key == "RWSIM_STRATEGY").then(|| "round_robin".to_string())
    });
    assert!(result.is_err());
}

#[test]
fn test_lookup_validates_result() {
    let result = SimulationConfig::from_lookup(|key| {
        (key == "RWSIM_AUTO_SPAWN_INTERVAL_MS").then(|| "0".to_string())
    });
    assert!(result.unwrap_err().contains("interval_ms"));
}
