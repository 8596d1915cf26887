//! Error types for coordinator operations.

use thiserror::Error;

use crate::lock::WorkerId;

/// Errors produced by the coordinator.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The simulation is paused and does not accept new workers.
    #[error("simulation is paused")]
    Paused,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No strategy goes by the requested name.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    /// No live worker has this id.
    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),
    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
