//! # rw_arbiter
//!
//! Readers-writers arbitration with pluggable admission strategies.
//!
//! Many readers may hold a shared resource at once; a writer needs it alone.
//! How contention is resolved is a policy choice, and this crate ships four
//! of them behind one [`lock::LockManager`] contract:
//!
//! - **Reader priority**: readers enter whenever no writer is active. Best
//!   concurrency, but a steady reader stream starves writers.
//! - **Writer priority**: a waiting writer freezes new readers. Writers are
//!   served promptly, readers may starve instead.
//! - **Fair FIFO**: admission strictly in arrival order, with consecutive
//!   readers at the head of the queue admitted together.
//! - **Adaptive**: reader priority until a writer has waited past a
//!   starvation threshold, then writer priority until it is served.
//!
//! On top of the locks sits a small simulation core: reader and writer
//! workers on OS threads, a shared integer resource, wait-time metrics, and
//! an event stream observers can subscribe to.
//!
//! ```rust,no_run
//! use rw_arbiter::config::{SimulationConfig, StrategyKind};
//! use rw_arbiter::core::Coordinator;
//! use rw_arbiter::lock::Role;
//!
//! let coordinator = Coordinator::new(SimulationConfig::with_strategy(StrategyKind::Adaptive))?;
//! for _ in 0..5 {
//!     coordinator.spawn(Role::Reader)?;
//! }
//! coordinator.spawn(Role::Writer)?;
//! coordinator.join_all();
//!
//! let snapshot = coordinator.snapshot();
//! println!("value={} avg writer wait={:?}", snapshot.value, snapshot.avg_write_wait);
//! # Ok::<(), rw_arbiter::core::SimulationError>(())
//! ```
//!
//! ## Module layout
//!
//! - [`lock`]: the four lock managers and their shared contract
//! - [`core`]: resource, workers, metrics, events, coordinator
//! - [`config`]: serde configuration with environment overrides
//! - [`builders`]: lock construction from configuration
//! - [`util`]: clock and tracing helpers

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct lock managers from configuration.
pub mod builders;
/// Configuration models for strategies, workers, and auto-spawn.
pub mod config;
/// Simulation core: resource, workers, metrics, events, coordinator.
pub mod core;
/// Readers-writers lock managers.
pub mod lock;
/// Shared utilities.
pub mod util;
