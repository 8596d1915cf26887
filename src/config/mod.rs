//! Configuration models for the lock, workers, and load generation.

pub mod simulation;

pub use simulation::{
    AutoSpawnConfig, HoldRange, LockConfig, SimulationConfig, StrategyKind, WorkerConfig,
};
