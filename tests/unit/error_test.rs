//! Tests for error types

use std::time::Duration;

use rw_arbiter::core::SimulationError;
use rw_arbiter::lock::AdmissionError;

#[test]
fn test_paused_error() {
    let err = SimulationError::Paused;
    assert_eq!(format!("{}", err), "simulation is paused");
}

#[test]
fn test_invalid_config_error() {
    let err = SimulationError::InvalidConfig("hold_slices must be > 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: hold_slices must be > 0"
    );
}

#[test]
fn test_unknown_strategy_error() {
    let err = SimulationError::UnknownStrategy("lottery".to_string());
    assert_eq!(format!("{}", err), "unknown strategy: lottery");
}

#[test]
fn test_unknown_worker_error() {
    let err = SimulationError::UnknownWorker(7);
    assert_eq!(format!("{}", err), "unknown worker: 7");
}

#[test]
fn test_spawn_error_from_io() {
    let io = std::io::Error::other("no threads left");
    let err: SimulationError = io.into();
    assert!(matches!(err, SimulationError::Spawn(_)));
    assert!(format!("{}", err).contains("no threads left"));
}

#[test]
fn test_admission_errors() {
    assert_eq!(format!("{}", AdmissionError::Cancelled), "admission cancelled");
    assert_eq!(
        format!("{}", AdmissionError::TimedOut(Duration::from_millis(250))),
        "admission timed out after 250ms"
    );
}

#[test]
fn test_app_result_wraps_simulation_error() {
    fn fails() -> rw_arbiter::core::AppResult<()> {
        Err(SimulationError::Paused.into())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<SimulationError>().is_some());
}
