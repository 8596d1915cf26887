//! Load harness: runs the auto-spawner against one strategy and prints the
//! final snapshot as JSON.
//!
//! Every event is logged once through `tracing` at `info`; set `RUST_LOG` to
//! change the level. Configuration comes from `RWSIM_*` environment variables
//! (and `.env`).
//! `RWSIM_RUN_SECS` sets how long to generate load, default 10. The first
//! command-line argument, if given, overrides the strategy.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use rw_arbiter::config::SimulationConfig;
use rw_arbiter::core::{AppResult, Coordinator};
use rw_arbiter::lock::Role;
use rw_arbiter::util::init_tracing;
use tracing::info;

const DEFAULT_RUN_SECS: u64 = 10;

fn main() -> AppResult<()> {
    init_tracing();

    let mut config = SimulationConfig::from_env().map_err(|e| anyhow!(e))?;
    if let Some(name) = std::env::args().nth(1) {
        config.lock.strategy = name.parse().map_err(|e: String| anyhow!(e))?;
    }
    let run_secs = match std::env::var("RWSIM_RUN_SECS") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("RWSIM_RUN_SECS: invalid seconds `{raw}`"))?,
        Err(_) => DEFAULT_RUN_SECS,
    };

    let strategy = config.lock.strategy;
    let coordinator = Arc::new(Coordinator::new(config)?);
    info!(%strategy, run_secs, "load started");

    let spawner = coordinator.start_auto_spawn()?;
    thread::sleep(Duration::from_secs(run_secs));
    spawner.stop();
    coordinator.pause();

    let outcomes = coordinator.join_all();
    let snapshot = coordinator.snapshot();
    info!(
        workers = outcomes.len(),
        value = snapshot.value,
        avg_read_wait_ms = snapshot.avg_wait(Role::Reader).as_millis(),
        avg_write_wait_ms = snapshot.avg_wait(Role::Writer).as_millis(),
        "load finished"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("serializing snapshot")?
    );
    Ok(())
}
