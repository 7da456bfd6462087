//! Integration tests for resumable batch runs.
//!
//! Exercises the full path from CSV inputs on disk through the price cache,
//! the batch driver and the persisted simulation store.

// Allow unwrap in tests - tests should panic on unexpected errors
#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use monte_carlo_engine::infrastructure::{
    FilePriceSource, load_comparison_table_csv, load_ledger_csv,
};
use monte_carlo_engine::pricing::{PriceCache, PriceCacheError, RetryConfig};
use monte_carlo_engine::simulation::{
    BatchConfig, BatchDriver, BeatProbability, ExecutionMode, SimulationContext, SimulationStore,
    current_roi,
};
use monte_carlo_engine::SimulationError;

// =============================================================================
// Fixtures
// =============================================================================

const LEDGER_CSV: &str = "\
,ticker_sym,qty,cost,purchased_at
0,AAPL,10,1500.0,2021-01-04
1,MSFT,5,1100.0,2021-01-04
2,AAPL,5,800.0,2021-06-01
3,NVDA,2,1000.0,2021-09-01
";

const UNIVERSE_CSV: &str = "\
Unnamed: 0,xom_qty,ko_qty,pfe_qty,t_qty,f_qty,ge_qty
0,30.0,27.0,41.0,52.0,120.0,18.0
1,22.0,19.8,30.1,38.1,88.0,13.2
2,13.1,14.0,16.0,27.5,45.0,8.9
3,14.5,17.1,22.0,35.0,40.0,10.1
";

const PRICES: [(&str, f64); 9] = [
    ("AAPL", 190.0),
    ("MSFT", 410.0),
    ("NVDA", 880.0),
    ("XOM", 110.0),
    ("KO", 60.0),
    ("PFE", 28.0),
    ("T", 17.0),
    ("F", 12.0),
    ("GE", 160.0),
];

struct Workspace {
    dir: TempDir,
    context: SimulationContext,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("purchases.csv"), LEDGER_CSV).unwrap();
        std::fs::write(dir.path().join("alt.csv"), UNIVERSE_CSV).unwrap();

        let ledger = load_ledger_csv(&dir.path().join("purchases.csv")).unwrap();
        let table = load_comparison_table_csv(&dir.path().join("alt.csv"), ledger.len()).unwrap();
        let context = SimulationContext::new(ledger, table).unwrap();
        Self { dir, context }
    }

    fn store_path(&self) -> std::path::PathBuf {
        self.dir.path().join("sims.csv")
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("prices.json")
    }

    fn cache(&self, source: FilePriceSource) -> PriceCache<FilePriceSource> {
        let (cache, _) = PriceCache::load_or_initialize(source, self.cache_path()).unwrap();
        cache.with_retry(RetryConfig::immediate(3))
    }

    fn run(&self, cache: &PriceCache<FilePriceSource>, config: BatchConfig) -> Vec<f64> {
        let (mut store, _) = SimulationStore::load_or_initialize(self.store_path()).unwrap();
        BatchDriver::new(&self.context, cache, config).run(&mut store).unwrap();
        reload(&self.store_path())
    }
}

fn full_source() -> FilePriceSource {
    PRICES
        .iter()
        .fold(FilePriceSource::default(), |source, (ticker, price)| {
            source.with_spot(*ticker, *price)
        })
}

fn reload(path: &Path) -> Vec<f64> {
    SimulationStore::load_or_initialize(path)
        .unwrap()
        .0
        .into_outcomes()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_sequential_run_resumes_without_replacing() {
    let ws = Workspace::new();
    let cache = ws.cache(full_source());

    let first = ws.run(&cache, BatchConfig::new(20).with_flush_every(7));
    assert_eq!(first.len(), 20);

    // Same target again: nothing to do.
    let again = ws.run(&cache, BatchConfig::new(20));
    assert_eq!(again, first);

    // Larger target: only the difference runs, earlier outcomes untouched.
    let grown = ws.run(&cache, BatchConfig::new(35).with_flush_every(10));
    assert_eq!(grown.len(), 35);
    assert_eq!(&grown[..20], first.as_slice());
}

#[test]
fn test_parallel_run_tops_up_persisted_store() {
    let ws = Workspace::new();
    let cache = ws.cache(full_source());

    let sequential = ws.run(&cache, BatchConfig::new(10));
    let parallel_config = BatchConfig::new(40)
        .with_mode(ExecutionMode::Parallel)
        .with_workers(2)
        .with_flush_every(8);
    let combined = ws.run(&cache, parallel_config);

    assert_eq!(combined.len(), 40);
    assert_eq!(&combined[..10], sequential.as_slice());
    assert!(combined.iter().all(|roi| roi.is_finite()));
}

#[test]
fn test_price_cache_survives_restart() {
    let ws = Workspace::new();
    let cache = ws.cache(full_source());
    ws.run(&cache, BatchConfig::new(5));
    drop(cache);

    // A source with no prices at all: everything must come from the cache file.
    let offline = ws.cache(FilePriceSource::default());
    for (ticker, price) in PRICES {
        if ticker == "AAPL" || ticker == "MSFT" || ticker == "NVDA" {
            continue;
        }
        assert_eq!(offline.cached(ticker), Some(price), "{ticker} not cached");
    }

    let outcomes = ws.run(&offline, BatchConfig::new(12));
    assert_eq!(outcomes.len(), 12);
    assert_eq!(offline.fetch_count(), 0);
}

#[test]
fn test_unpriceable_universe_fails_before_any_trial() {
    let ws = Workspace::new();
    let source = full_source().with_spot("GE", f64::NAN);
    let cache = ws.cache(source);

    let (mut store, _) = SimulationStore::load_or_initialize(ws.store_path()).unwrap();
    let err = BatchDriver::new(&ws.context, &cache, BatchConfig::new(10))
        .run(&mut store)
        .unwrap_err();

    match err {
        SimulationError::PriceCache(PriceCacheError::TooManyRetries { rounds, unresolved }) => {
            assert_eq!(rounds, 3);
            assert_eq!(unresolved, vec!["GE".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.is_empty());
    assert!(!ws.store_path().exists());
}

#[test]
fn test_seeded_runs_are_reproducible_across_modes() {
    let seq = Workspace::new();
    let par = Workspace::new();
    let seq_cache = seq.cache(full_source());
    let par_cache = par.cache(full_source());

    let mut a = seq.run(&seq_cache, BatchConfig::new(25).with_seed(99));
    let mut b = par.run(
        &par_cache,
        BatchConfig::new(25)
            .with_seed(99)
            .with_mode(ExecutionMode::Parallel)
            .with_workers(3),
    );
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    assert_eq!(a, b);
}

#[test]
fn test_beat_probability_against_stored_outcomes() {
    let ws = Workspace::new();
    let cache = ws.cache(full_source());
    let outcomes = ws.run(&cache, BatchConfig::new(50));

    let actual = current_roi(ws.context.ledger(), &cache).unwrap();
    // (15*190 + 5*410 + 2*880) / 4400 - 1
    assert!((actual - (6660.0 / 4400.0 - 1.0)).abs() < 1e-12);

    let result = BeatProbability::compute(actual, &outcomes);
    assert_eq!(result.total_simulations, 50);
    assert_eq!(
        result.simulations_at_or_above,
        outcomes.iter().filter(|roi| **roi >= actual).count()
    );
    assert!((0.0..=1.0).contains(&result.probability));
}

#[test]
fn test_purchase_dates_are_parsed() {
    let ws = Workspace::new();
    let first = ws.context.ledger().first_purchase().unwrap();
    assert_eq!(first, NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
}
