//! Batch driver.
//!
//! Drives a [`SimulationStore`] to a target trial count through the phases
//! `Loading -> Running -> Flushing -> ... -> Done`. Both execution modes are
//! incrementally resumable: the driver computes the shortfall against what
//! is already stored, runs it in chunks of `flush_every` trials, and appends
//! and persists after every chunk. Stored outcomes are never replaced.
//!
//! # Execution modes
//!
//! - **Sequential**: one trial at a time on the calling thread. Outcomes are
//!   stored in trial order.
//! - **Parallel**: trials fan out over a dedicated rayon pool sized to half
//!   the available hardware parallelism. Outcomes come back over a channel in
//!   completion order, so only their distribution is meaningful; the report
//!   tags them as [`Outcomes::Unordered`].
//!
//! # Example
//!
//! ```ignore
//! use monte_carlo_engine::simulation::{BatchConfig, BatchDriver, ExecutionMode};
//!
//! let config = BatchConfig::new(10_000).with_mode(ExecutionMode::Parallel);
//! let report = BatchDriver::new(&context, &cache, config).run(&mut store)?;
//! println!("{} new trials, {} total", report.executed, report.outcomes.len());
//! ```

use std::sync::mpsc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, info_span, warn};

use super::runner::SimulationContext;
use super::store::SimulationStore;
use crate::error::SimulationError;
use crate::observability;
use crate::pricing::PriceLookup;

// ============================================
// Configuration
// ============================================

/// How trials are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One trial at a time, outcomes in trial order.
    #[default]
    Sequential,
    /// Worker pool, outcomes in completion order.
    Parallel,
}

impl ExecutionMode {
    /// Metric label for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Total outcomes the store should hold when the batch is done.
    pub target: usize,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Trials per chunk; the store is persisted after every chunk.
    pub flush_every: usize,
    /// Worker threads for parallel mode (`None` = half the hardware threads).
    pub workers: Option<usize>,
    /// Base seed. Trial `i` draws from a generator derived from `(seed, i)`.
    pub seed: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            target: 1_000,
            mode: ExecutionMode::Sequential,
            flush_every: 100,
            workers: None,
            seed: None,
        }
    }
}

impl BatchConfig {
    /// Sequential batch to `target` trials.
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Set the execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the chunk size between flushes.
    #[must_use]
    pub const fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every;
        self
    }

    /// Set the worker count for parallel mode.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Make draws reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Worker threads actually used in parallel mode.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }
}

/// Half the available hardware parallelism, at least one.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

// ============================================
// Outcomes
// ============================================

/// Trial outcomes whose order carries no meaning.
///
/// Exposes only order-independent views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnorderedOutcomes(Vec<f64>);

impl UnorderedOutcomes {
    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no outcomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Outcomes in ascending order.
    #[must_use]
    pub fn sorted(&self) -> Vec<f64> {
        sorted(&self.0)
    }

    /// Count of outcomes satisfying `predicate`.
    pub fn count_where(&self, predicate: impl Fn(f64) -> bool) -> usize {
        self.0.iter().filter(|v| predicate(**v)).count()
    }
}

/// Outcomes returned by a batch, tagged with whether their order is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcomes {
    /// Trial order: the store was only ever filled sequentially.
    Ordered(Vec<f64>),
    /// Completion order, or order unknown (any parallel chunk involved, or
    /// outcomes reloaded from disk).
    Unordered(UnorderedOutcomes),
}

impl Outcomes {
    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(values) => values.len(),
            Self::Unordered(values) => values.len(),
        }
    }

    /// Whether there are no outcomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outcomes in ascending order.
    #[must_use]
    pub fn sorted(&self) -> Vec<f64> {
        match self {
            Self::Ordered(values) => sorted(values),
            Self::Unordered(values) => values.sorted(),
        }
    }

    /// Positional view, only for ordered outcomes.
    #[must_use]
    pub fn as_ordered(&self) -> Option<&[f64]> {
        match self {
            Self::Ordered(values) => Some(values),
            Self::Unordered(_) => None,
        }
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

// ============================================
// Driver
// ============================================

/// Phase of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
    /// Inputs loaded, shortfall being computed.
    Loading,
    /// Trials executing.
    Running,
    /// Outcomes being appended and persisted.
    Flushing,
    /// Target reached.
    Done,
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Mode the batch ran in.
    pub mode: ExecutionMode,
    /// Outcomes already stored before the run.
    pub loaded: usize,
    /// Trials executed by this run.
    pub executed: usize,
    /// Flushes performed.
    pub flushes: u32,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Every stored outcome after the run.
    pub outcomes: Outcomes,
}

struct Chunk {
    outcomes: Vec<f64>,
    error: Option<SimulationError>,
}

/// Runs trials until a store reaches its target.
pub struct BatchDriver<'a, P: PriceLookup + ?Sized> {
    context: &'a SimulationContext,
    prices: &'a P,
    config: BatchConfig,
    phase: BatchPhase,
}

impl<'a, P: PriceLookup + ?Sized> BatchDriver<'a, P> {
    /// Create a driver.
    #[must_use]
    pub const fn new(context: &'a SimulationContext, prices: &'a P, config: BatchConfig) -> Self {
        Self {
            context,
            prices,
            config,
            phase: BatchPhase::Loading,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BatchPhase {
        self.phase
    }

    /// Batch configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run trials until `store` holds at least `target` outcomes.
    ///
    /// A trial failure aborts the batch; outcomes completed before it are
    /// still appended and persisted.
    pub fn run(&mut self, store: &mut SimulationStore) -> Result<BatchReport, SimulationError> {
        let mode = self.config.mode;
        let target = self.config.target;
        let span = info_span!("batch.run", mode = %mode, target_trials = target);
        let _enter = span.enter();
        let started = Instant::now();

        self.set_phase(BatchPhase::Loading);
        let loaded = store.len();
        let shortfall = store.shortfall(target);
        info!(loaded, shortfall, "Batch loaded");

        let mut report = BatchReport {
            mode,
            loaded,
            executed: 0,
            flushes: 0,
            elapsed_ms: 0,
            outcomes: Outcomes::Ordered(Vec::new()),
        };

        if shortfall > 0 {
            self.prices.prepare(&self.context.priced_tickers())?;

            let pool = match mode {
                ExecutionMode::Sequential => None,
                ExecutionMode::Parallel => Some(self.build_pool()?),
            };
            let chunk_size = self.config.flush_every.max(1);

            while store.len() < target {
                self.set_phase(BatchPhase::Running);
                let first_index = store.len();
                let count = chunk_size.min(target - first_index);
                let chunk = match &pool {
                    None => self.run_sequential(first_index, count),
                    Some(pool) => self.run_parallel(pool, first_index, count),
                };

                self.set_phase(BatchPhase::Flushing);
                let completed = chunk.outcomes.len();
                store.append(chunk.outcomes)?;
                if pool.is_some() && completed > 0 {
                    store.mark_completion_order();
                }
                store.persist()?;
                self.prices.persist()?;
                report.executed += completed;
                report.flushes += 1;
                observability::record_trials_completed(mode.as_str(), completed as u64);

                if let Some(error) = chunk.error {
                    observability::record_trial_failure();
                    warn!(
                        completed,
                        stored = store.len(),
                        error = %error,
                        "Trial failed, aborting batch"
                    );
                    return Err(error);
                }

                log_progress(&started, report.executed, shortfall, store.len(), target);
            }
        }

        self.set_phase(BatchPhase::Done);
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report.outcomes = if store.is_in_trial_order() {
            Outcomes::Ordered(store.outcomes().to_vec())
        } else {
            Outcomes::Unordered(UnorderedOutcomes(store.outcomes().to_vec()))
        };

        info!(
            executed = report.executed,
            total = store.len(),
            flushes = report.flushes,
            elapsed_ms = report.elapsed_ms,
            "Batch complete"
        );
        Ok(report)
    }

    fn set_phase(&mut self, phase: BatchPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "Batch phase change");
            self.phase = phase;
        }
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool, SimulationError> {
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mc-worker-{i}"))
            .build()
            .map_err(|e| SimulationError::ThreadPool(e.to_string()))?;
        info!(workers, "Worker pool started");
        Ok(pool)
    }

    fn run_sequential(&self, first_index: usize, count: usize) -> Chunk {
        let mut outcomes = Vec::with_capacity(count);
        for index in first_index..first_index + count {
            match self.run_one(index) {
                Ok(roi) => outcomes.push(roi),
                Err(error) => {
                    return Chunk {
                        outcomes,
                        error: Some(error),
                    };
                }
            }
        }
        Chunk {
            outcomes,
            error: None,
        }
    }

    fn run_parallel(&self, pool: &rayon::ThreadPool, first_index: usize, count: usize) -> Chunk {
        let (tx, rx) = mpsc::channel();
        let result = pool.install(|| {
            (first_index..first_index + count)
                .into_par_iter()
                .try_for_each_with(tx, |tx, index| {
                    let roi = self.run_one(index)?;
                    // The receiver outlives the pool scope.
                    let _ = tx.send(roi);
                    Ok::<(), SimulationError>(())
                })
        });

        Chunk {
            outcomes: rx.into_iter().collect(),
            error: result.err(),
        }
    }

    fn run_one(&self, index: usize) -> Result<f64, SimulationError> {
        let _span = debug_span!("trial", index).entered();
        let started = Instant::now();
        let mut rng = trial_rng(self.config.seed, index);
        let roi = self.context.run_trial(&mut rng, self.prices)?;
        observability::record_trial_duration(started.elapsed().as_secs_f64());
        Ok(roi)
    }
}

/// Generator for the trial at global position `index`.
///
/// With a seed, every position gets its own stream, so resumed and parallel
/// runs never replay earlier draws.
#[must_use]
pub fn trial_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

fn log_progress(started: &Instant, executed: usize, shortfall: usize, stored: usize, target: usize) {
    let elapsed = started.elapsed().as_secs_f64();
    let trials_per_sec = if elapsed > 0.0 {
        executed as f64 / elapsed
    } else {
        0.0
    };
    let eta_secs = if trials_per_sec > 0.0 {
        (shortfall.saturating_sub(executed) as f64 / trials_per_sec) as u64
    } else {
        0
    };
    debug!(
        stored,
        target_trials = target,
        trials_per_sec,
        eta_secs,
        "Batch progress"
    );
}

/// Sequentially run a store up to `target` trials.
pub fn run_simulations<P>(
    context: &SimulationContext,
    prices: &P,
    store: &mut SimulationStore,
    target: usize,
) -> Result<BatchReport, SimulationError>
where
    P: PriceLookup + ?Sized,
{
    BatchDriver::new(context, prices, BatchConfig::new(target)).run(store)
}

/// Run a store up to `target` trials on the default worker pool.
pub fn run_simulations_multi<P>(
    context: &SimulationContext,
    prices: &P,
    store: &mut SimulationStore,
    target: usize,
) -> Result<BatchReport, SimulationError>
where
    P: PriceLookup + ?Sized,
{
    let config = BatchConfig::new(target).with_mode(ExecutionMode::Parallel);
    BatchDriver::new(context, prices, config).run(store)
}
