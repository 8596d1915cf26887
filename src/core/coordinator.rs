//! Worker orchestration, run lifecycle, and read-only snapshots.
//!
//! A *run* bundles one lock manager, one shared resource and one metrics
//! record. [`Coordinator::reset`] stops and joins every worker of the current
//! run before swapping in a fresh one, so no old worker can touch the new
//! resource or the old one after `reset` returns.
//!
//! ```no_run
//! use rw_arbiter::config::{SimulationConfig, StrategyKind};
//! use rw_arbiter::core::Coordinator;
//! use rw_arbiter::lock::Role;
//!
//! let coordinator = Coordinator::new(SimulationConfig::default())?;
//! let events = coordinator.subscribe();
//! coordinator.spawn(Role::Reader)?;
//! coordinator.spawn(Role::Writer)?;
//! println!("{:?}", coordinator.snapshot());
//!
//! coordinator.reset(Some(StrategyKind::FairFifo))?;
//! for event in events.try_iter() {
//!     println!("{event}");
//! }
//! # Ok::<(), rw_arbiter::core::SimulationError>(())
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::builders::build_lock_manager;
use crate::config::{LockConfig, SimulationConfig, StrategyKind};
use crate::core::events::{CallbackEventSink, EventBus, LockEvent, TracingEventSink};
use crate::core::metrics::Metrics;
use crate::core::resource::SharedResource;
use crate::core::worker::{self, WorkerContext, WorkerHandle, WorkerOutcome, WorkerSpec};
use crate::core::SimulationError;
use crate::lock::{Role, WorkerId};

/// Read-only view of a run at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identifier of the current run.
    pub run_id: Uuid,
    /// Strategy in force.
    pub strategy: StrategyKind,
    /// Readers holding admission.
    pub active_readers: usize,
    /// Their ids, in admission order.
    pub active_reader_ids: Vec<WorkerId>,
    /// Writer holding admission.
    pub active_writer: Option<WorkerId>,
    /// Readers waiting for admission.
    pub waiting_readers: usize,
    /// Writers waiting for admission.
    pub waiting_writers: usize,
    /// Waiting reader ids, in arrival order.
    pub waiting_reader_ids: Vec<WorkerId>,
    /// Waiting writer ids, in arrival order.
    pub waiting_writer_ids: Vec<WorkerId>,
    /// Current resource value.
    pub value: i64,
    /// Completed reads.
    pub total_reads: u64,
    /// Applied writes.
    pub total_writes: u64,
    /// Highest reader concurrency observed.
    pub max_concurrent_readers: usize,
    /// Mean admission wait of recent readers.
    pub avg_read_wait: Duration,
    /// Mean admission wait of recent writers.
    pub avg_write_wait: Duration,
    /// Completed critical sections per second.
    pub throughput: f64,
    /// Completed critical sections.
    pub completed: u64,
    /// Worker threads still running.
    pub live_workers: usize,
    /// Whether new workers are refused.
    pub paused: bool,
}

impl Snapshot {
    /// Mean wait for `role`.
    #[must_use]
    pub const fn avg_wait(&self, role: Role) -> Duration {
        match role {
            Role::Reader => self.avg_read_wait,
            Role::Writer => self.avg_write_wait,
        }
    }
}

struct Run {
    id: Uuid,
    ctx: WorkerContext,
}

impl Run {
    fn new(
        lock_cfg: &LockConfig,
        wait_history: usize,
        events: &Arc<EventBus>,
    ) -> Result<Self, SimulationError> {
        let lock = build_lock_manager(lock_cfg).map_err(SimulationError::InvalidConfig)?;
        Ok(Self {
            id: Uuid::new_v4(),
            ctx: WorkerContext {
                lock,
                resource: Arc::new(SharedResource::new()),
                metrics: Arc::new(Mutex::new(Metrics::new(wait_history))),
                events: Arc::clone(events),
            },
        })
    }
}

/// Owns the current run and every worker spawned into it.
pub struct Coordinator {
    config: RwLock<SimulationConfig>,
    run: RwLock<Arc<Run>>,
    workers: Mutex<Vec<WorkerHandle>>,
    /// Serializes spawning against reset.
    gate: Mutex<()>,
    next_id: AtomicU64,
    paused: AtomicBool,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("run_id", &self.run.read().id)
            .field("strategy", &self.config.read().lock.strategy)
            .field("workers", &self.workers.lock().len())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Validate `config` and start the first run.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] if validation fails.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate().map_err(SimulationError::InvalidConfig)?;
        let events = Arc::new(EventBus::new(config.event_history, Uuid::nil()));
        events.add_sink(Arc::new(TracingEventSink));
        let run = Run::new(&config.lock, config.wait_history, &events)?;
        events.begin_run(run.id);
        info!(
            strategy = %config.lock.strategy,
            run_id = %run.id,
            "coordinator started"
        );
        Ok(Self {
            config: RwLock::new(config),
            run: RwLock::new(Arc::new(run)),
            workers: Mutex::new(Vec::new()),
            gate: Mutex::new(()),
            next_id: AtomicU64::new(1),
            paused: AtomicBool::new(false),
            events,
        })
    }

    /// Spawn a worker with a hold drawn from the configured range.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Paused`] while paused, or
    /// [`SimulationError::Spawn`] if the thread cannot be started.
    pub fn spawn(&self, role: Role) -> Result<WorkerId, SimulationError> {
        let hold = {
            let config = self.config.read();
            let range = match role {
                Role::Reader => config.workers.reader_hold,
                Role::Writer => config.workers.writer_hold,
            };
            range.sample(&mut rand::rng())
        };
        self.spawn_with_hold(role, hold)
    }

    /// Spawn a worker that holds the lock for exactly `hold`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::spawn`].
    pub fn spawn_with_hold(&self, role: Role, hold: Duration) -> Result<WorkerId, SimulationError> {
        if self.is_paused() {
            return Err(SimulationError::Paused);
        }
        let _gate = self.gate.lock();
        let ctx = self.run.read().ctx.clone();
        let slices = self.config.read().workers.hold_slices;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let handle = worker::spawn(
            WorkerSpec {
                id,
                role,
                hold,
                slices,
            },
            ctx,
        )?;
        let mut workers = self.workers.lock();
        reap(&mut workers);
        workers.push(handle);
        debug!(worker_id = id, role = %role, hold_ms = hold.as_millis(), "worker spawned");
        Ok(id)
    }

    /// One auto-spawn tick: maybe a reader, maybe a writer, independently.
    ///
    /// # Errors
    ///
    /// Same as [`Self::spawn`].
    pub fn spawn_random(&self) -> Result<Vec<WorkerId>, SimulationError> {
        if self.is_paused() {
            return Err(SimulationError::Paused);
        }
        let (p_reader, p_writer) = {
            let auto = &self.config.read().auto_spawn;
            (auto.reader_probability, auto.writer_probability)
        };
        let mut rng = rand::rng();
        let mut spawned = Vec::new();
        if rng.random_bool(p_reader) {
            spawned.push(self.spawn(Role::Reader)?);
        }
        if rng.random_bool(p_writer) {
            spawned.push(self.spawn(Role::Writer)?);
        }
        Ok(spawned)
    }

    /// Run [`Self::spawn_random`] every configured interval on a background
    /// thread until the returned spawner is stopped or dropped.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Spawn`] if the thread cannot be started.
    pub fn start_auto_spawn(self: &Arc<Self>) -> Result<AutoSpawner, SimulationError> {
        let interval = self.config.read().auto_spawn.interval();
        let coordinator = Arc::downgrade(self);
        let (stop_tx, stop_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("rw-auto-spawn".into())
            .spawn(move || auto_spawn_loop(&coordinator, &stop_rx, interval))?;
        info!(interval_ms = interval.as_millis(), "auto-spawn started");
        Ok(AutoSpawner {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Ask one worker to stop.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownWorker`] if no running worker has `id`.
    pub fn stop_worker(&self, id: WorkerId) -> Result<(), SimulationError> {
        let workers = self.workers.lock();
        let handle = workers
            .iter()
            .find(|h| h.id() == id && !h.is_finished())
            .ok_or(SimulationError::UnknownWorker(id))?;
        handle.stop();
        info!(worker_id = id, "worker stop requested");
        Ok(())
    }

    /// Wait for every current worker to end on its own and return outcomes
    /// in spawn order. Workers that panicked report `None`.
    pub fn join_all(&self) -> Vec<(WorkerId, Option<WorkerOutcome>)> {
        let handles = std::mem::take(&mut *self.workers.lock());
        handles
            .into_iter()
            .map(|mut h| (h.id(), h.join()))
            .collect()
    }

    /// Stop and join every worker, then start a new run. `strategy` replaces
    /// the current strategy when given. Worker ids keep increasing.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] if the resulting lock
    /// configuration is invalid; the current run is left untouched.
    pub fn reset(&self, strategy: Option<StrategyKind>) -> Result<(), SimulationError> {
        let mut lock_cfg = self.config.read().lock.clone();
        if let Some(strategy) = strategy {
            lock_cfg.strategy = strategy;
        }
        self.reset_with(lock_cfg)
    }

    /// [`Self::reset`] with the strategy given by configuration name.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownStrategy`] for an unrecognised name.
    pub fn reset_by_name(&self, strategy: &str) -> Result<(), SimulationError> {
        let kind = strategy
            .parse()
            .map_err(|_| SimulationError::UnknownStrategy(strategy.to_string()))?;
        self.reset(Some(kind))
    }

    /// [`Self::reset`] with a complete lock configuration.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] if `lock_cfg` is invalid.
    pub fn reset_with(&self, lock_cfg: LockConfig) -> Result<(), SimulationError> {
        let wait_history = self.config.read().wait_history;
        let run = Run::new(&lock_cfg, wait_history, &self.events)?;

        let _gate = self.gate.lock();
        let stopped = self.stop_all();
        self.events.begin_run(run.id);
        info!(
            strategy = %lock_cfg.strategy,
            run_id = %run.id,
            stopped,
            "simulation reset"
        );
        self.config.write().lock = lock_cfg;
        *self.run.write() = Arc::new(run);
        Ok(())
    }

    /// Stop and join every worker without starting a new run.
    pub fn shutdown(&self) {
        let _gate = self.gate.lock();
        let stopped = self.stop_all();
        if stopped > 0 {
            info!(stopped, "coordinator shut down");
        }
    }

    fn stop_all(&self) -> usize {
        let mut handles = std::mem::take(&mut *self.workers.lock());
        for handle in &handles {
            handle.stop();
        }
        for handle in &mut handles {
            handle.join();
        }
        handles.len()
    }

    /// Refuse new workers until [`Self::resume`].
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Accept new workers again.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether new workers are refused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Strategy of the current run.
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.config.read().lock.strategy
    }

    /// Point-in-time view. Takes the lock manager's bookkeeping mutex only
    /// for the copy; workers are never blocked.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let run = Arc::clone(&self.run.read());
        let lock = run.ctx.lock.state();
        let resource = run.ctx.resource.stats();
        let (avg_read_wait, avg_write_wait, throughput, completed) = {
            let metrics = run.ctx.metrics.lock();
            (
                metrics.avg_wait(Role::Reader),
                metrics.avg_wait(Role::Writer),
                metrics.throughput(),
                metrics.completed(),
            )
        };
        let live_workers = self
            .workers
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count();
        Snapshot {
            run_id: run.id,
            strategy: lock.strategy,
            active_readers: lock.active_readers,
            active_reader_ids: lock.active_reader_ids,
            active_writer: lock.active_writer,
            waiting_readers: lock.waiting_readers,
            waiting_writers: lock.waiting_writers,
            waiting_reader_ids: lock.waiting_reader_ids,
            waiting_writer_ids: lock.waiting_writer_ids,
            value: resource.value,
            total_reads: resource.total_reads,
            total_writes: resource.total_writes,
            max_concurrent_readers: lock.max_concurrent_readers,
            avg_read_wait,
            avg_write_wait,
            throughput,
            completed,
            live_workers,
            paused: self.is_paused(),
        }
    }

    /// Receiver of every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<LockEvent> {
        self.events.subscribe()
    }

    /// Invoke `callback` for every event. It runs on the emitting worker's
    /// thread and must return quickly.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&LockEvent) + Send + Sync + 'static,
    {
        self.events.add_sink(Arc::new(CallbackEventSink::new(callback)));
    }

    /// Recent events of the current run, oldest first.
    #[must_use]
    pub fn recent_events(&self) -> Vec<LockEvent> {
        self.events.recent()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Join handles of finished workers are released here.
fn reap(workers: &mut Vec<WorkerHandle>) {
    let (done, live): (Vec<_>, Vec<_>) = workers.drain(..).partition(WorkerHandle::is_finished);
    *workers = live;
    for mut handle in done {
        handle.join();
    }
}

fn auto_spawn_loop(coordinator: &Weak<Coordinator>, stop_rx: &Receiver<()>, interval: Duration) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        match coordinator.spawn_random() {
            Ok(ids) if !ids.is_empty() => debug!(?ids, "auto-spawned workers"),
            Ok(_) | Err(SimulationError::Paused) => {}
            Err(e) => warn!(error = %e, "auto-spawn tick failed"),
        }
    }
    debug!("auto-spawn stopped");
}

/// Background spawner returned by [`Coordinator::start_auto_spawn`].
#[derive(Debug)]
pub struct AutoSpawner {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AutoSpawner {
    /// Stop ticking and wait for the background thread.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("auto-spawn thread panicked");
            }
        }
    }
}

impl Drop for AutoSpawner {
    fn drop(&mut self) {
        self.halt();
    }
}
