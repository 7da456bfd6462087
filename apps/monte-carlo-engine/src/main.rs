//! Monte Carlo Engine Binary
//!
//! Tops the simulation store up to the configured trial count and prints a
//! JSON summary of where the real portfolio's ROI falls among the random
//! comparison portfolios.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin monte-carlo-engine -- [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `MC_CONFIG`: Config file path when none is passed (default: config.yaml;
//!   built-in defaults if that file does not exist)
//! - `RUST_LOG`: Log level (default: info)

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use monte_carlo_engine::config::{
    CONFIG_PATH_ENV, Config, DEFAULT_CONFIG_PATH, load_config, load_config_from_string,
};
use monte_carlo_engine::infrastructure::{
    FilePriceSource, load_comparison_table_csv, load_ledger_csv,
};
use monte_carlo_engine::models::ComparisonTable;
use monte_carlo_engine::observability::{MetricsConfig, init_metrics, write_metrics};
use monte_carlo_engine::pricing::PriceCache;
use monte_carlo_engine::simulation::{
    BatchDriver, BeatProbability, CostBasis, DistributionStats, ExecutionMode, SimulationContext,
    SimulationStore, benchmark_rois, cost_basis, current_roi,
};
use monte_carlo_engine::SimulationError;
use serde::Serialize;

/// JSON document printed on stdout.
#[derive(Debug, Serialize)]
struct RunSummary {
    lots: usize,
    total_cost: f64,
    trials: TrialSummary,
    beat_probability: BeatProbability,
    distribution: DistributionStats,
    benchmarks: BTreeMap<String, f64>,
    cost_basis: Vec<CostBasis>,
}

#[derive(Debug, Serialize)]
struct TrialSummary {
    mode: ExecutionMode,
    loaded: usize,
    executed: usize,
    stored: usize,
    elapsed_ms: u64,
}

fn main() -> Result<()> {
    load_dotenv();
    init_tracing();

    let config = resolve_config(std::env::args().nth(1).as_deref()).context("loading configuration")?;

    let metrics = match &config.paths.metrics_output {
        Some(_) => Some(init_metrics(&MetricsConfig::default()).context("installing metrics recorder")?),
        None => None,
    };

    let summary = match run(&config) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Monte Carlo run aborted");
            return Err(e).context("running simulations");
        }
    };

    if let (Some(handle), Some(path)) = (&metrics, &config.paths.metrics_output) {
        write_metrics(handle, Path::new(path)).context("writing metrics")?;
        tracing::info!(path = %path, "Metrics written");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("serializing summary")?
    );
    Ok(())
}

/// Load .env from the working directory or the nearest ancestor holding one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses static directive strings that are compile-time constants guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "monte_carlo_engine=info"
                    .parse()
                    .expect("static directive 'monte_carlo_engine=info' is valid"),
            ),
        )
        .init();
}

/// Explicit path, then `$MC_CONFIG`, then `config.yaml` if present, else defaults.
fn resolve_config(arg: Option<&str>) -> Result<Config, SimulationError> {
    let named = arg.is_some() || std::env::var(CONFIG_PATH_ENV).is_ok_and(|p| !p.is_empty());
    let config = if named || Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(arg)?
    } else {
        tracing::info!("No config file found, using defaults");
        load_config_from_string("")?
    };
    tracing::info!(
        target_trials = config.simulation.target_trials,
        mode = %config.simulation.mode,
        store = %config.paths.simulation_store,
        "Configuration loaded"
    );
    Ok(config)
}

fn run(config: &Config) -> Result<RunSummary, SimulationError> {
    let paths = &config.paths;

    let ledger = load_ledger_csv(Path::new(&paths.ledger))?;
    let universe = load_comparison_table_csv(Path::new(&paths.universe_table), ledger.len())?;
    let benchmark_tables = paths
        .benchmark_tables
        .iter()
        .map(|path| load_comparison_table_csv(Path::new(path), ledger.len()))
        .collect::<Result<Vec<ComparisonTable>, _>>()?;

    let source = FilePriceSource::from_files(Path::new(&paths.spot_prices), Path::new(&paths.close_history))?;
    let (cache, _) = PriceCache::load_or_initialize(source, &paths.price_cache)?;
    let cache = cache
        .with_crypto(config.pricing.crypto_tickers.clone(), config.pricing.crypto_quote.clone())
        .with_retry(config.pricing.retry_config());

    let context = SimulationContext::new(ledger, universe)?;

    // Trial tickers are warmed by the driver; the real portfolio and the
    // benchmarks are priced here.
    let mut tickers: Vec<String> = context.held_tickers().iter().cloned().collect();
    tickers.extend(config.benchmarks.tickers.iter().cloned());
    cache.warm_up(&tickers, &config.pricing.retry_config())?;

    let (mut store, _) = SimulationStore::load_or_initialize(&paths.simulation_store)?;
    let report = BatchDriver::new(&context, &cache, config.simulation.batch_config()).run(&mut store)?;
    cache.flush()?;

    let actual_roi = current_roi(context.ledger(), &cache)?;
    let mut tables: Vec<&ComparisonTable> = vec![context.table()];
    tables.extend(benchmark_tables.iter());
    let benchmarks = benchmark_rois(context.ledger(), &config.benchmarks.tickers, &tables, &cache)?;

    let beat_probability = BeatProbability::compute(actual_roi, store.outcomes());
    tracing::info!(
        actual_roi,
        probability = beat_probability.probability,
        percentile_rank = beat_probability.percentile_rank,
        trials = store.len(),
        "Analysis complete"
    );

    Ok(RunSummary {
        lots: context.ledger().len(),
        total_cost: context.ledger().total_cost(),
        trials: TrialSummary {
            mode: report.mode,
            loaded: report.loaded,
            executed: report.executed,
            stored: store.len(),
            elapsed_ms: report.elapsed_ms,
        },
        distribution: DistributionStats::from_values(store.outcomes()),
        beat_probability,
        benchmarks,
        cost_basis: cost_basis(context.ledger(), &cache)?,
    })
}
