//! Simulation configuration structures.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Admission discipline used by the lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Readers always win; writers may starve.
    #[default]
    ReaderPriority,
    /// Any waiting writer freezes new readers.
    WriterPriority,
    /// Strict arrival order regardless of role.
    FairFifo,
    /// Reader priority until a writer ages past the starvation threshold.
    Adaptive,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::ReaderPriority,
        Self::WriterPriority,
        Self::FairFifo,
        Self::Adaptive,
    ];

    /// Configuration name of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReaderPriority => "reader_priority",
            Self::WriterPriority => "writer_priority",
            Self::FairFifo => "fair_fifo",
            Self::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown strategy `{s}`"))
    }
}

/// Lock manager configuration consumed at reset time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Strategy selection.
    pub strategy: StrategyKind,
    /// Writer age that triggers reader freezing (adaptive only).
    pub starvation_threshold_ms: u64,
    /// Optional upper bound on how long a worker may wait for admission.
    pub admission_timeout_ms: Option<u64>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            starvation_threshold_ms: 2_000,
            admission_timeout_ms: None,
        }
    }
}

impl LockConfig {
    /// Configuration for `strategy` with every other value at its default.
    #[must_use]
    pub fn for_strategy(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Starvation threshold as a duration.
    #[must_use]
    pub const fn starvation_threshold(&self) -> Duration {
        Duration::from_millis(self.starvation_threshold_ms)
    }

    /// Admission timeout as a duration, if one is configured.
    #[must_use]
    pub fn admission_timeout(&self) -> Option<Duration> {
        self.admission_timeout_ms.map(Duration::from_millis)
    }

    /// Validate lock configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.starvation_threshold_ms == 0 {
            return Err("starvation_threshold_ms must be greater than 0".into());
        }
        if self.admission_timeout_ms == Some(0) {
            return Err("admission_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }
}

/// Inclusive range a hold duration is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRange {
    /// Shortest hold in milliseconds.
    pub min_ms: u64,
    /// Longest hold in milliseconds.
    pub max_ms: u64,
}

impl HoldRange {
    /// Range from `min_ms` to `max_ms` inclusive.
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Range that always yields `ms`.
    #[must_use]
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Draw a hold duration uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if self.min_ms > self.max_ms {
            return Err(format!("{name}: min_ms must not exceed max_ms"));
        }
        Ok(())
    }
}

/// Worker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Hold range for readers.
    pub reader_hold: HoldRange,
    /// Hold range for writers.
    pub writer_hold: HoldRange,
    /// Number of sub-intervals a hold is sliced into for stop checks.
    pub hold_slices: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reader_hold: HoldRange::new(500, 2_000),
            writer_hold: HoldRange::new(1_000, 3_000),
            hold_slices: 10,
        }
    }
}

impl WorkerConfig {
    /// Validate worker configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.reader_hold.validate("reader_hold")?;
        self.writer_hold.validate("writer_hold")?;
        if self.hold_slices == 0 {
            return Err("hold_slices must be greater than 0".into());
        }
        Ok(())
    }
}

/// Random worker creation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSpawnConfig {
    /// Milliseconds between spawn ticks.
    pub interval_ms: u64,
    /// Probability that a tick creates a reader.
    pub reader_probability: f64,
    /// Probability that a tick creates a writer.
    pub writer_probability: f64,
}

impl Default for AutoSpawnConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            reader_probability: 0.7,
            writer_probability: 0.3,
        }
    }
}

impl AutoSpawnConfig {
    /// Tick interval as a duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate auto-spawn configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".into());
        }
        for (name, p) in [
            ("reader_probability", self.reader_probability),
            ("writer_probability", self.writer_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("{name} must be within 0.0..=1.0"));
            }
        }
        Ok(())
    }
}

/// Root simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Lock manager settings.
    pub lock: LockConfig,
    /// Worker settings.
    pub workers: WorkerConfig,
    /// Wait-time samples kept per role.
    pub wait_history: usize,
    /// Events kept in the in-memory history.
    pub event_history: usize,
    /// Random spawn settings.
    pub auto_spawn: AutoSpawnConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            workers: WorkerConfig::default(),
            wait_history: 100,
            event_history: 200,
            auto_spawn: AutoSpawnConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Default configuration using `strategy`.
    #[must_use]
    pub fn with_strategy(strategy: StrategyKind) -> Self {
        Self {
            lock: LockConfig::for_strategy(strategy),
            ..Self::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.lock.validate().map_err(|e| format!("lock: {e}"))?;
        self.workers.validate().map_err(|e| format!("workers: {e}"))?;
        self.auto_spawn
            .validate()
            .map_err(|e| format!("auto_spawn: {e}"))?;
        if self.wait_history == 0 {
            return Err("wait_history must be greater than 0".into());
        }
        if self.event_history == 0 {
            return Err("event_history must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse simulation configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `RWSIM_*` environment
    /// variables. A `.env` file in the working directory is loaded first.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(name) = lookup("RWSIM_STRATEGY") {
            cfg.lock.strategy = name.parse()?;
        }
        if let Some(ms) = lookup("RWSIM_STARVATION_THRESHOLD_MS") {
            cfg.lock.starvation_threshold_ms = parse_ms("RWSIM_STARVATION_THRESHOLD_MS", &ms)?;
        }
        if let Some(ms) = lookup("RWSIM_ADMISSION_TIMEOUT_MS") {
            cfg.lock.admission_timeout_ms = Some(parse_ms("RWSIM_ADMISSION_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("RWSIM_AUTO_SPAWN_INTERVAL_MS") {
            cfg.auto_spawn.interval_ms = parse_ms("RWSIM_AUTO_SPAWN_INTERVAL_MS", &ms)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_ms(key: &str, raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: invalid milliseconds `{raw}`: {e}"))
}
